use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{
    dao::models::{CardEntity, MatchEntity},
    state::match_session::ScoreLedger,
};

pub const MATCH_PREFIX: &str = "match::";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchMatchDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: MatchBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBody {
    pub match_id: String,
    pub scores: ScoreLedger,
    pub cards: Vec<CardEntity>,
    pub saved_at: SystemTime,
}

impl From<MatchEntity> for CouchMatchDocument {
    fn from(entity: MatchEntity) -> Self {
        Self {
            id: match_doc_id(&entity.match_id),
            rev: None,
            body: MatchBody {
                match_id: entity.match_id,
                scores: entity.scores,
                cards: entity.cards,
                saved_at: entity.saved_at,
            },
        }
    }
}

impl From<CouchMatchDocument> for MatchEntity {
    fn from(doc: CouchMatchDocument) -> Self {
        Self {
            match_id: doc.body.match_id,
            scores: doc.body.scores,
            cards: doc.body.cards,
            saved_at: doc.body.saved_at,
        }
    }
}

impl CouchMatchDocument {
    /// Attach the revision read from CouchDB so the write replaces that revision.
    pub fn with_revision(mut self, rev: Option<String>) -> Self {
        self.rev = rev;
        self
    }
}

pub fn match_doc_id(match_id: &str) -> String {
    format!("{}{}", MATCH_PREFIX, match_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_are_keyed_by_match_id_without_revision() {
        let entity = MatchEntity {
            match_id: "match-77".into(),
            scores: [("player-1".to_string(), 4)].into_iter().collect(),
            cards: vec![CardEntity {
                q_id: 1,
                question: "SQL stands for?".into(),
                answer: "Structured Query Language".into(),
            }],
            saved_at: SystemTime::UNIX_EPOCH,
        };

        let doc = CouchMatchDocument::from(entity.clone());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "match::match-77");
        assert!(json.get("_rev").is_none());
        assert_eq!(json["match_id"], "match-77");

        assert_eq!(MatchEntity::from(doc.clone()), entity);

        let update = doc.with_revision(Some("2-abc".into()));
        assert_eq!(serde_json::to_value(&update).unwrap()["_rev"], "2-abc");
    }
}

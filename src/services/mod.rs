/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match channel relay over WebSocket.
pub mod relay_service;
/// Insert-only storage of finished match records.
pub mod result_service;
/// Result store connection supervisor.
pub mod storage_supervisor;

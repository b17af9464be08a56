// Public route handlers - no session required
//
// Routes:
//   GET  /            - service information
//   GET  /health      - liveness and core pool ping
//   POST /auth/login  - credentials login (disabled in keycloak mode)

pub mod auth;
pub mod system;

// Protected route handlers - a valid session is required
//
// The session middleware runs first and places the caller's Actor in the
// request extensions. Entity routes additionally carry their SchemaDescriptor.
//
// Routes:
//   GET    /api/auth/whoami
//   POST   /api/auth/logout
//   GET    /api/schemas
//   GET    /api/schemas/:slug
//   GET    /api/users
//   POST   /api/users
//   GET    /api/lookups/:slug/:field
//   GET|POST|PUT|DELETE <descriptor apiEndpoint>

pub mod auth;
pub mod entity;
pub mod lookups;
pub mod schemas;
pub mod users;

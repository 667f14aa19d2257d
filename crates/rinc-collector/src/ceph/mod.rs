//! Client for the storage cluster's dashboard REST API.

pub mod api;
pub mod token;

pub use api::{DashboardApiConfig, DashboardClient};
pub use token::{AuthToken, PasswordTokenSource, Permissions, TokenManager, TokenSource};

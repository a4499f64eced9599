//! Principal extraction middleware
//!
//! Authentication happens upstream of the gateway. The authenticating layer
//! forwards the resolved identity in `x-tollgate-*` headers, which are
//! trusted as-is here and never forwarded to providers.

use std::str::FromStr;

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::error::AppError;

/// Header carrying the calling project id
pub const PROJECT_ID_HEADER: &str = "x-tollgate-project-id";
/// Header carrying the caller kind
pub const PRINCIPAL_TYPE_HEADER: &str = "x-tollgate-principal-type";
/// Header carrying the parent organization id
pub const ORGANIZATION_ID_HEADER: &str = "x-tollgate-organization-id";

/// Kind of caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrincipalKind {
    #[default]
    Project,
    User,
    Service,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Project => "project",
            PrincipalKind::User => "user",
            PrincipalKind::Service => "service",
        }
    }
}

impl FromStr for PrincipalKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(PrincipalKind::Project),
            "user" => Ok(PrincipalKind::User),
            "service" => Ok(PrincipalKind::Service),
            _ => Err(()),
        }
    }
}

/// Calling tenant, immutable for the lifetime of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub project_id: String,
    pub kind: PrincipalKind,
    /// Parent aggregate for usage accounting
    pub organization_id: Option<String>,
}

impl Principal {
    pub fn new(project_id: impl Into<String>, kind: PrincipalKind) -> Self {
        Self {
            project_id: project_id.into(),
            kind,
            organization_id: None,
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Read the principal from trusted identity headers
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let project_id = header_str(headers, PROJECT_ID_HEADER)
            .filter(|id| is_valid_id(id))
            .ok_or(AppError::MissingPrincipal)?;

        let kind = match header_str(headers, PRINCIPAL_TYPE_HEADER) {
            Some(raw) => raw.parse().map_err(|_| AppError::MissingPrincipal)?,
            None => PrincipalKind::default(),
        };

        let organization_id = match header_str(headers, ORGANIZATION_ID_HEADER) {
            Some(org) if is_valid_id(org) => Some(org.to_string()),
            Some(_) => return Err(AppError::MissingPrincipal),
            None => None,
        };

        Ok(Self {
            project_id: project_id.to_string(),
            kind,
            organization_id,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Ids become part of store keys, so the alphabet is restricted
fn is_valid_id(id: &str) -> bool {
    id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Principal extraction middleware
///
/// Adds [`Principal`] to the request extensions, or rejects with 401.
pub async fn principal_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let principal = match Principal::from_headers(request.headers()) {
        Ok(principal) => principal,
        Err(e) => {
            warn!(path = %request.uri().path(), "Request without a valid principal");
            return Err(e);
        }
    };

    debug!(
        project_id = %principal.project_id,
        kind = principal.kind.as_str(),
        organization_id = ?principal.organization_id,
        "Principal resolved"
    );

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

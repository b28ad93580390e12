//! Access rules for markup documents.
//!
//! DESIGN
//! ======
//! This is the only place that decides who may read or write a document.
//! Handlers and the resolver never inspect location, site or role directly.
//!
//! - Read: administrators read everything; otherwise the owner reads a
//!   personal document and site members read a shared one.
//! - Write: the owner writes a personal document; site members and
//!   administrators write a shared one.
//!
//! Deleted documents are neither readable nor writable.

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;

use markup::{Location, MarkupDocument, SiteId, UserId};

/// Role supplied by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Worker,
    SiteManager,
    Partner,
    Admin,
    SystemAdmin,
}

impl Role {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "worker" => Some(Self::Worker),
            "site_manager" => Some(Self::SiteManager),
            "partner" => Some(Self::Partner),
            "admin" => Some(Self::Admin),
            "system_admin" => Some(Self::SystemAdmin),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::SiteManager => "site_manager",
            Self::Partner => "partner",
            Self::Admin => "admin",
            Self::SystemAdmin => "system_admin",
        }
    }

    #[must_use]
    pub fn is_administrator(self) -> bool {
        matches!(self, Self::Admin | Self::SystemAdmin)
    }
}

/// The caller of a resolver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub site_id: Option<SiteId>,
}

impl Actor {
    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.role.is_administrator()
    }

    fn same_site(&self, doc: &MarkupDocument) -> bool {
        matches!((self.site_id, doc.site_id), (Some(mine), Some(theirs)) if mine == theirs)
    }
}

#[must_use]
pub fn can_read(actor: &Actor, doc: &MarkupDocument) -> bool {
    if doc.is_deleted {
        return false;
    }
    if actor.is_administrator() {
        return true;
    }
    match doc.location {
        Location::Personal => doc.created_by == actor.user_id,
        Location::Shared => actor.same_site(doc),
    }
}

#[must_use]
pub fn can_write(actor: &Actor, doc: &MarkupDocument) -> bool {
    if doc.is_deleted {
        return false;
    }
    match doc.location {
        Location::Personal => doc.created_by == actor.user_id,
        Location::Shared => actor.is_administrator() || actor.same_site(doc),
    }
}

//! Typed permission map stored on every role.
//!
//! Permissions are a closed record of features, each with four grant bits.
//! The map round-trips to JSONB on the `roles` table, so adding a feature
//! means adding a field here rather than accepting arbitrary keys.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Features a role can be granted access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Dashboard,
    Leads,
    Customers,
    Tickets,
    Tasks,
    Meetings,
    Projects,
    Quotations,
    Invoices,
    Analytics,
    Settings,
    Users,
}

/// Actions that can be granted per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionAction {
    View,
    Create,
    Edit,
    Delete,
}

/// Grant bits for a single feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Grants {
    pub view: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
}

impl Grants {
    /// All four bits set.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            view: true,
            create: true,
            edit: true,
            delete: true,
        }
    }

    /// View only.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            view: true,
            create: false,
            edit: false,
            delete: false,
        }
    }

    /// Nothing granted.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            view: false,
            create: false,
            edit: false,
            delete: false,
        }
    }

    /// View, create, and edit without delete.
    #[must_use]
    pub const fn contribute() -> Self {
        Self {
            view: true,
            create: true,
            edit: true,
            delete: false,
        }
    }

    #[must_use]
    pub const fn allows(&self, action: PermissionAction) -> bool {
        match action {
            PermissionAction::View => self.view,
            PermissionAction::Create => self.create,
            PermissionAction::Edit => self.edit,
            PermissionAction::Delete => self.delete,
        }
    }
}

/// Permission record for one role, one field per feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PermissionMap {
    pub dashboard: Grants,
    pub leads: Grants,
    pub customers: Grants,
    pub tickets: Grants,
    pub tasks: Grants,
    pub meetings: Grants,
    pub projects: Grants,
    pub quotations: Grants,
    pub invoices: Grants,
    pub analytics: Grants,
    pub settings: Grants,
    pub users: Grants,
}

impl PermissionMap {
    /// Every feature fully granted. Used for the superadmin and admin roles.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            dashboard: Grants::all(),
            leads: Grants::all(),
            customers: Grants::all(),
            tickets: Grants::all(),
            tasks: Grants::all(),
            meetings: Grants::all(),
            projects: Grants::all(),
            quotations: Grants::all(),
            invoices: Grants::all(),
            analytics: Grants::all(),
            settings: Grants::all(),
            users: Grants::all(),
        }
    }

    /// Defaults for the seeded employee role: work the CRM records, read the
    /// money and analytics, no settings or user management.
    #[must_use]
    pub const fn employee() -> Self {
        Self {
            dashboard: Grants::read_only(),
            leads: Grants::contribute(),
            customers: Grants::contribute(),
            tickets: Grants::contribute(),
            tasks: Grants::contribute(),
            meetings: Grants::contribute(),
            projects: Grants::read_only(),
            quotations: Grants::read_only(),
            invoices: Grants::read_only(),
            analytics: Grants::read_only(),
            settings: Grants::none(),
            users: Grants::none(),
        }
    }

    #[must_use]
    pub const fn grants(&self, feature: Feature) -> Grants {
        match feature {
            Feature::Dashboard => self.dashboard,
            Feature::Leads => self.leads,
            Feature::Customers => self.customers,
            Feature::Tickets => self.tickets,
            Feature::Tasks => self.tasks,
            Feature::Meetings => self.meetings,
            Feature::Projects => self.projects,
            Feature::Quotations => self.quotations,
            Feature::Invoices => self.invoices,
            Feature::Analytics => self.analytics,
            Feature::Settings => self.settings,
            Feature::Users => self.users,
        }
    }

    #[must_use]
    pub const fn allows(&self, feature: Feature, action: PermissionAction) -> bool {
        self.grants(feature).allows(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_map_allows_everything() {
        let map = PermissionMap::full();
        assert!(map.allows(Feature::Tickets, PermissionAction::Delete));
        assert!(map.allows(Feature::Users, PermissionAction::Create));
        assert!(map.allows(Feature::Settings, PermissionAction::Edit));
    }

    #[test]
    fn employee_map_is_restricted() {
        let map = PermissionMap::employee();
        assert!(map.allows(Feature::Leads, PermissionAction::Create));
        assert!(map.allows(Feature::Tickets, PermissionAction::Edit));
        assert!(!map.allows(Feature::Tickets, PermissionAction::Delete));
        assert!(!map.allows(Feature::Users, PermissionAction::View));
        assert!(!map.allows(Feature::Settings, PermissionAction::View));
        assert!(map.allows(Feature::Invoices, PermissionAction::View));
        assert!(!map.allows(Feature::Invoices, PermissionAction::Create));
    }

    #[test]
    fn none_denies_every_action() {
        let grants = Grants::none();
        assert!(!grants.allows(PermissionAction::View));
        assert!(!grants.allows(PermissionAction::Create));
        assert!(!grants.allows(PermissionAction::Edit));
        assert!(!grants.allows(PermissionAction::Delete));
        assert_eq!(grants, Grants::default());
    }

    #[test]
    fn default_map_denies_everything() {
        let map = PermissionMap::default();
        assert!(!map.allows(Feature::Dashboard, PermissionAction::View));
        assert!(!map.allows(Feature::Leads, PermissionAction::Create));
    }

    #[test]
    fn map_round_trips_through_json() {
        let map = PermissionMap::employee();
        let value = serde_json::to_value(map).expect("serialize");
        assert_eq!(value["leads"]["create"], serde_json::json!(true));
        assert_eq!(value["tickets"]["delete"], serde_json::json!(false));

        let decoded: PermissionMap = serde_json::from_value(value).expect("deserialize");
        assert_eq!(decoded, map);
    }

    #[test]
    fn missing_fields_default_to_denied() {
        // Older rows may predate a feature; absent keys mean no access.
        let decoded: PermissionMap =
            serde_json::from_str(r#"{"leads":{"view":true}}"#).expect("deserialize");
        assert!(decoded.allows(Feature::Leads, PermissionAction::View));
        assert!(!decoded.allows(Feature::Leads, PermissionAction::Edit));
        assert!(!decoded.allows(Feature::Tickets, PermissionAction::View));
    }
}

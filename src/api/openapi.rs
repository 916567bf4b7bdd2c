use super::handlers::{auth, crm, health, me, roles, root};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(root::root))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::verification::verify_email))
        .routes(routes!(auth::password_reset::forgot_password))
        .routes(routes!(auth::password_reset::reset_password))
        .routes(routes!(auth::password_reset::change_password))
        .routes(routes!(auth::session::logout))
        .routes(routes!(auth::session::logout_all))
        .routes(routes!(me::get_me, me::update_me))
        .routes(routes!(me::update_preferences))
        .routes(routes!(roles::create_role, roles::list_roles))
        .routes(routes!(
            roles::get_role,
            roles::update_role,
            roles::delete_role
        ))
        .routes(routes!(roles::update_role_permissions))
        .routes(routes!(roles::assign_role))
        .routes(routes!(roles::list_role_users))
        .routes(routes!(crm::dashboard::get_dashboard))
        .routes(routes!(crm::leads::list_leads, crm::leads::create_lead))
        .routes(routes!(
            crm::leads::get_lead,
            crm::leads::update_lead,
            crm::leads::delete_lead
        ))
        .routes(routes!(
            crm::customers::list_customers,
            crm::customers::create_customer
        ))
        .routes(routes!(
            crm::customers::get_customer,
            crm::customers::update_customer,
            crm::customers::delete_customer
        ))
        .routes(routes!(
            crm::tickets::list_tickets,
            crm::tickets::create_ticket
        ))
        .routes(routes!(
            crm::tickets::get_ticket,
            crm::tickets::update_ticket,
            crm::tickets::delete_ticket
        ))
        .routes(routes!(crm::tasks::list_tasks, crm::tasks::create_task))
        .routes(routes!(
            crm::tasks::get_task,
            crm::tasks::update_task,
            crm::tasks::delete_task
        ))
        .routes(routes!(
            crm::meetings::list_meetings,
            crm::meetings::create_meeting
        ))
        .routes(routes!(
            crm::meetings::get_meeting,
            crm::meetings::update_meeting,
            crm::meetings::delete_meeting
        ))
        .routes(routes!(
            crm::projects::list_projects,
            crm::projects::create_project
        ))
        .routes(routes!(
            crm::projects::get_project,
            crm::projects::update_project,
            crm::projects::delete_project
        ))
        .routes(routes!(
            crm::quotations::list_quotations,
            crm::quotations::create_quotation
        ))
        .routes(routes!(
            crm::quotations::get_quotation,
            crm::quotations::update_quotation,
            crm::quotations::delete_quotation
        ))
        .routes(routes!(
            crm::invoices::list_invoices,
            crm::invoices::create_invoice
        ))
        .routes(routes!(
            crm::invoices::get_invoice,
            crm::invoices::update_invoice,
            crm::invoices::delete_invoice
        ))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).tags(Some(tags())).build()
}

fn tags() -> Vec<Tag> {
    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Registration, login, sessions, and profile".to_string());

    let mut roles_tag = Tag::new("roles");
    roles_tag.description = Some("Role and permission management".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service health and metadata".to_string());

    vec![users_tag, roles_tag, health_tag]
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn tags_survive_router_build() {
        let spec = openapi();
        let tags = spec.tags.expect("tags should be set");
        let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(names, vec!["users", "roles", "health"]);
    }

    #[test]
    fn all_user_routes_documented() {
        let spec = openapi();
        let paths = &spec.paths.paths;
        for path in [
            "/api/users/register",
            "/api/users/login",
            "/api/users/verify-email",
            "/api/users/forgot-password",
            "/api/users/reset-password/{token}",
            "/api/users/change-password",
            "/api/users/logout",
            "/api/users/logout-all",
            "/api/users/me",
            "/api/users/preferences",
        ] {
            assert!(paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn all_crm_resources_documented() {
        let spec = openapi();
        let paths = &spec.paths.paths;
        for resource in [
            "leads",
            "customers",
            "tickets",
            "tasks",
            "meetings",
            "projects",
            "quotations",
            "invoices",
        ] {
            assert!(paths.contains_key(&format!("/api/{resource}")));
            assert!(paths.contains_key(&format!("/api/{resource}/{{id}}")));
        }
        assert!(paths.contains_key("/api/dashboard"));
        assert!(paths.contains_key("/api/roles"));
        assert!(paths.contains_key("/api/roles/{id}"));
        assert!(paths.contains_key("/api/roles/{id}/permissions"));
        assert!(paths.contains_key("/api/roles/{id}/assign"));
        assert!(paths.contains_key("/api/roles/{id}/users"));
        assert!(paths.contains_key("/health"));
    }
}

//! Server-rendered HTML for the auth forms and admin views

use axum::response::Html;
use folio_shared::{Invite, User};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub const INVALID_LOGIN: &str = "Invalid email or password";

/// Minimal HTML escaping for text and attribute values
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} | Folio</title>\n</head>\n<body>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        escape(title),
        body
    ))
}

fn error_block(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p class=\"error\" role=\"alert\">{}</p>\n", escape(e)))
        .unwrap_or_default()
}

fn admin_nav(user: &User) -> String {
    let admin_links = if user.is_admin() {
        "<a href=\"/admin/users\">Users</a> <a href=\"/admin/invites/new\">Invite</a> "
    } else {
        ""
    };
    format!(
        "<nav><a href=\"/admin\">Dashboard</a> {}<a href=\"/admin/password\">Password</a> \
         <a href=\"/admin/logout\">Log out</a></nav>\n",
        admin_links
    )
}

pub fn login(error: Option<&str>, email: &str) -> Html<String> {
    layout(
        "Log in",
        &format!(
            "<h1>Log in</h1>\n{}\
             <form method=\"post\" action=\"/admin/login\">\n\
             <label>Email <input type=\"email\" name=\"email\" value=\"{}\" required autofocus></label>\n\
             <label>Password <input type=\"password\" name=\"password\" required></label>\n\
             <button type=\"submit\">Log in</button>\n</form>",
            error_block(error),
            escape(email)
        ),
    )
}

/// Registration form for a redeemable invite
pub fn register(invite: &Invite, error: Option<&str>, name: &str) -> Html<String> {
    layout(
        "Create your account",
        &format!(
            "<h1>Create your account</h1>\n\
             <p>You were invited as <strong>{}</strong>.</p>\n{}\
             <form method=\"post\" action=\"/register\">\n\
             <input type=\"hidden\" name=\"token\" value=\"{}\">\n\
             <label>Name <input type=\"text\" name=\"name\" value=\"{}\" required maxlength=\"255\"></label>\n\
             <label>Password <input type=\"password\" name=\"password\" required minlength=\"8\" maxlength=\"128\"></label>\n\
             <button type=\"submit\">Register</button>\n</form>",
            escape(&invite.email),
            error_block(error),
            escape(&invite.token),
            escape(name)
        ),
    )
}

/// Shown for unknown, expired or consumed invite links
pub fn invite_unavailable(message: &str) -> Html<String> {
    layout(
        "Invite unavailable",
        &format!(
            "<h1>Invite unavailable</h1>\n{}<p>Ask the site owner for a new invite.</p>",
            error_block(Some(message))
        ),
    )
}

pub fn dashboard(user: &User) -> Html<String> {
    layout(
        "Dashboard",
        &format!(
            "{}<h1>Welcome, {}</h1>\n<p>Signed in as {} ({}).</p>",
            admin_nav(user),
            escape(&user.name),
            escape(&user.email),
            user.role
        ),
    )
}

pub fn users(current: &User, users: &[User], invites: &[Invite]) -> Html<String> {
    let user_rows: String = users
        .iter()
        .map(|u| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>\
                 <form method=\"post\" action=\"/admin/users/{}/sessions/delete\">\
                 <button type=\"submit\">Revoke sessions</button></form></td></tr>\n",
                escape(&u.name),
                escape(&u.email),
                u.role,
                timestamp(u.created_at),
                u.id
            )
        })
        .collect();

    let invite_rows: String = invites
        .iter()
        .map(|i| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>\
                 <form method=\"post\" action=\"/admin/invites/{}/delete\">\
                 <button type=\"submit\">Revoke</button></form></td></tr>\n",
                escape(&i.email),
                timestamp(i.created_at),
                timestamp(i.expires_at),
                i.id
            )
        })
        .collect();

    let invites_section = if invites.is_empty() {
        "<p>No pending invites.</p>".to_string()
    } else {
        format!(
            "<table>\n<tr><th>Email</th><th>Created</th><th>Expires</th><th></th></tr>\n{}</table>",
            invite_rows
        )
    };

    layout(
        "Users",
        &format!(
            "{}<h1>Users</h1>\n\
             <table>\n<tr><th>Name</th><th>Email</th><th>Role</th><th>Joined</th><th></th></tr>\n{}</table>\n\
             <h2>Pending invites</h2>\n{}\n<p><a href=\"/admin/invites/new\">Invite someone</a></p>",
            admin_nav(current),
            user_rows,
            invites_section
        ),
    )
}

pub fn new_invite(current: &User, error: Option<&str>, email: &str) -> Html<String> {
    layout(
        "Invite",
        &format!(
            "{}<h1>Invite someone</h1>\n{}\
             <form method=\"post\" action=\"/admin/invites\">\n\
             <label>Email <input type=\"email\" name=\"email\" value=\"{}\" required></label>\n\
             <button type=\"submit\">Create invite</button>\n</form>",
            admin_nav(current),
            error_block(error),
            escape(email)
        ),
    )
}

pub fn invite_created(current: &User, invite: &Invite, link: &str) -> Html<String> {
    layout(
        "Invite created",
        &format!(
            "{}<h1>Invite created</h1>\n\
             <p>Send this link to <strong>{}</strong>. It expires {}.</p>\n\
             <p><input type=\"text\" readonly value=\"{}\" size=\"80\"></p>\n\
             <p><a href=\"/admin/users\">Back to users</a></p>",
            admin_nav(current),
            escape(&invite.email),
            timestamp(invite.expires_at),
            escape(link)
        ),
    )
}

pub fn change_password(current: &User, error: Option<&str>, notice: Option<&str>) -> Html<String> {
    let notice = notice
        .map(|n| format!("<p class=\"notice\" role=\"status\">{}</p>\n", escape(n)))
        .unwrap_or_default();
    layout(
        "Change password",
        &format!(
            "{}<h1>Change password</h1>\n{}{}\
             <form method=\"post\" action=\"/admin/password\">\n\
             <label>Current password <input type=\"password\" name=\"current_password\" required></label>\n\
             <label>New password <input type=\"password\" name=\"new_password\" required minlength=\"8\" maxlength=\"128\"></label>\n\
             <button type=\"submit\">Update password</button>\n</form>\n\
             <p>Changing your password signs out every other session.</p>",
            admin_nav(current),
            error_block(error),
            notice
        ),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use folio_shared::{Role, UserId};

    fn user(role: Role) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: UserId::new(),
            email: "a@example.com".into(),
            name: "<script>alert(1)</script>".into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_login_shows_generic_error() {
        let Html(body) = login(Some(INVALID_LOGIN), "x\"@example.com");
        assert!(body.contains("Invalid email or password"));
        assert!(body.contains("value=\"x&quot;@example.com\""));
        assert!(body.contains("action=\"/admin/login\""));
    }

    #[test]
    fn test_dashboard_escapes_user_fields() {
        let Html(body) = dashboard(&user(Role::User));
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
        // Admin links only for admins
        assert!(!body.contains("/admin/users"));

        let Html(body) = dashboard(&user(Role::Admin));
        assert!(body.contains("/admin/users"));
    }
}

//! Bare HTML pages. No styling, just enough structure to carry the forms,
//! flash messages and account details.

use crate::{api::session::Flash, store::UserRecord};
use axum::response::Html;
use std::fmt::Write;

pub(crate) fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, flashes: &[Flash], body: &str) -> Html<String> {
    let mut alerts = String::new();
    for flash in flashes {
        let _ = writeln!(
            alerts,
            r#"<div class="alert alert-{}">{}</div>"#,
            flash.level.as_str(),
            escape(&flash.message)
        );
    }
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{alerts}{body}</body>\n</html>\n",
        escape(title)
    ))
}

pub(crate) fn login(flashes: &[Flash]) -> Html<String> {
    page(
        "Login",
        flashes,
        r#"<h2>Login</h2>
<form method="post" action="/login">
<input type="text" name="username" placeholder="Username" required>
<input type="password" name="password" placeholder="Password" required>
<button type="submit">Login</button>
</form>
<p><a href="/register">Create Account</a></p>
"#,
    )
}

pub(crate) fn register(flashes: &[Flash], min_password_length: usize) -> Html<String> {
    let hint = if min_password_length > 0 {
        format!("<small>Minimum {min_password_length} characters</small>\n")
    } else {
        String::new()
    };
    let body = format!(
        r#"<h2>Create Account</h2>
<form method="post" action="/register">
<input type="text" name="username" placeholder="Username" required>
<input type="text" name="full_name" placeholder="Full name" required>
<input type="email" name="email" placeholder="Email" required>
<input type="password" name="password" placeholder="Password" required>
{hint}<button type="submit">Create Account</button>
</form>
<p><a href="/login">Back to login</a></p>
"#
    );
    page("Create Account", flashes, &body)
}

fn header() -> &'static str {
    r#"<div class="header"><a href="/dashboard">Dashboard</a> <a href="/profile">Profile</a> <a href="/logout">Logout</a></div>
"#
}

fn last_login(user: &UserRecord) -> String {
    user.last_login.map_or_else(
        || "Never".to_string(),
        |ts| ts.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

pub(crate) fn dashboard(user: &UserRecord, flashes: &[Flash]) -> Html<String> {
    let body = format!(
        r#"{}<h1>Welcome, {}!</h1>
<h2>Dashboard Overview</h2>
<div class="stat-card">Full name: {}</div>
<div class="stat-card">Email: {}</div>
<div class="stat-card">Last login: {}</div>
"#,
        header(),
        escape(&user.username),
        escape(&user.full_name),
        escape(&user.email),
        last_login(user),
    );
    page("Dashboard", flashes, &body)
}

pub(crate) fn profile(user: &UserRecord, flashes: &[Flash]) -> Html<String> {
    let initial = user
        .username
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default();
    let body = format!(
        r#"{}<h1>User Profile</h1>
<div class="profile-avatar">{}</div>
<h2>{}</h2>
<span class="badge">Active User</span>
<dl>
<dt>Username:</dt><dd>{}</dd>
<dt>Full Name:</dt><dd>{}</dd>
<dt>Email:</dt><dd>{}</dd>
<dt>Member Since:</dt><dd>{}</dd>
<dt>Last Login:</dt><dd>{}</dd>
<dt>Account Status:</dt><dd>Active</dd>
</dl>
"#,
        header(),
        escape(&initial),
        escape(&user.username),
        escape(&user.username),
        escape(&user.full_name),
        escape(&user.email),
        user.created_at.format("%B %d, %Y"),
        last_login(user),
    );
    page("Profile", flashes, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::session::FlashLevel;
    use chrono::Utc;

    fn user() -> UserRecord {
        UserRecord {
            username: "testuser".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            email: "test@example.com".to_string(),
            full_name: "Test <User>".to_string(),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn flashes_render_with_level_class() {
        let flashes = vec![Flash {
            level: FlashLevel::Error,
            message: "Invalid username or password".to_string(),
        }];
        let Html(body) = login(&flashes);
        assert!(body.contains(
            r#"<div class="alert alert-error">Invalid username or password</div>"#
        ));
        assert!(body.contains("<h2>Login</h2>"));
    }

    #[test]
    fn register_shows_password_hint() {
        let Html(with_hint) = register(&[], 6);
        assert!(with_hint.contains("Minimum 6 characters"));
        let Html(without_hint) = register(&[], 0);
        assert!(!without_hint.contains("Minimum"));
    }

    #[test]
    fn dashboard_escapes_user_fields() {
        let Html(body) = dashboard(&user(), &[]);
        assert!(body.contains("Welcome, testuser!"));
        assert!(body.contains("Test &lt;User&gt;"));
        assert!(body.contains("Last login: Never"));
    }

    #[test]
    fn profile_shows_initial_and_details() {
        let Html(body) = profile(&user(), &[]);
        assert!(body.contains(r#"<div class="profile-avatar">T</div>"#));
        assert!(body.contains("Member Since:"));
        assert!(body.contains("Account Status:"));
    }
}

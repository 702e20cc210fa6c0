//! HTML pages served by the dashboard.
use common::records::PredictionRecord;

pub const USERNAME_TAKEN: &str = "Username already exists.";
pub const INVALID_CREDENTIALS: &str = "Invalid username or password.";
pub const MISSING_CREDENTIALS: &str = "Username and password are required.";

/// Escape text for use inside HTML elements and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>{title}</title>
</head>
<body>
<div class="container">
{content}
</div>
</body>
</html>
"#
    )
}

/// Home page. `history` holds the most recent predictions of the logged in user.
pub fn index(user: Option<&str>, history: &[PredictionRecord]) -> String {
    let header = match user {
        Some(user) => format!(
            r#"<p>Logged in as <strong>{}</strong> - <a href="/logout">Log out</a></p>"#,
            escape(user)
        ),
        None => r#"<p><a href="/login">Log in</a> or <a href="/register">register</a> to see your predictions.</p>"#.to_owned(),
    };

    let rows: String = history
        .iter()
        .map(|record| {
            format!(
                "        <tr><td>{}</td><td>{}</td><td>{:.2}</td></tr>\n",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                escape(&record.prediction),
                record.confidence
            )
        })
        .collect();
    let history = match rows.is_empty() {
        true => "<p>No predictions yet.</p>".to_owned(),
        false => format!(
            "<table>\n        <tr><th>Time (UTC)</th><th>Sign</th><th>Confidence</th></tr>\n{rows}    </table>"
        ),
    };

    let content = format!(
        r#"    <h3>Sign Language Predictions</h3>
    {header}
    <h4>Your latest prediction</h4>
    {history}
    <h4>Latest prediction overall</h4>
    <pre id="latest">Loading...</pre>
    <script>
        fetch("/data")
            .then(res => res.json())
            .then(data => {{
                document.getElementById("latest").textContent = JSON.stringify(data, null, 2);
            }});
    </script>"#
    );

    layout("Sign Language Predictions", &content)
}

fn credentials_form(title: &str, action: &str, message: Option<&str>, footer: &str) -> String {
    let message = message
        .map(|m| format!(r#"<p class="error">{}</p>"#, escape(m)))
        .unwrap_or_default();

    let content = format!(
        r#"    <h3>{title}</h3>
    {message}
    <form method="post" action="{action}">
        <input type="text" name="username" placeholder="Username">
        <input type="password" name="password" placeholder="Password">
        <button type="submit">{title}</button>
    </form>
    {footer}"#
    );

    layout(title, &content)
}

pub fn login(message: Option<&str>) -> String {
    credentials_form(
        "Log in",
        "/login",
        message,
        r#"<p>No account yet? <a href="/register">Register</a></p>"#,
    )
}

pub fn register(message: Option<&str>) -> String {
    credentials_form(
        "Register",
        "/register",
        message,
        r#"<p>Already registered? <a href="/login">Log in</a></p>"#,
    )
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_index_escapes_user() {
        let page = index(Some("<b>ada</b>"), &[]);
        assert!(page.contains("&lt;b&gt;ada&lt;/b&gt;"));
        assert!(page.contains("No predictions yet."));
    }

    #[test]
    fn test_index_lists_history() {
        let record = PredictionRecord::new("W".into(), 0.875, Some("ada".into()));
        let page = index(Some("ada"), &[record]);
        assert!(page.contains("<td>W</td>"));
        assert!(page.contains("<td>0.88</td>"));
    }

    #[test]
    fn test_login_message() {
        assert!(login(Some(INVALID_CREDENTIALS)).contains(INVALID_CREDENTIALS));
        assert!(!login(None).contains("class=\"error\""));
    }
}

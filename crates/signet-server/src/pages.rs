//! Server-rendered pages.
//!
//! Minimal HTML for the landing, dashboard and error views. All dynamic
//! values pass through [`escape`] before interpolation.

use signet_rp::flow::FlowState;
use signet_rp::profile::Profile;
use time::format_description::well_known::Rfc2822;

/// Escapes a string for safe interpolation into HTML text and attributes.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn shell(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 0; background: #eef2ff; color: #1f2937; }}
main {{ max-width: 44rem; margin: 3rem auto; padding: 0 1rem; }}
.card {{ background: #fff; border-radius: 0.75rem; box-shadow: 0 10px 25px rgba(0,0,0,0.08); padding: 2rem; margin-bottom: 1.5rem; }}
.button {{ display: inline-block; background: #4f46e5; color: #fff; border: 0; border-radius: 0.5rem; padding: 0.75rem 1.5rem; font-size: 1rem; text-decoration: none; cursor: pointer; }}
.button.danger {{ background: #dc2626; }}
.muted {{ color: #6b7280; font-size: 0.875rem; }}
dl dt {{ font-weight: 600; margin-top: 1rem; }}
dl dd {{ margin: 0.25rem 0 0 0; overflow-wrap: anywhere; }}
.note {{ background: #eff6ff; border: 1px solid #bfdbfe; border-radius: 0.5rem; padding: 1rem; font-size: 0.875rem; }}
</style>
</head>
<body>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

/// The sign-in landing page.
#[must_use]
pub fn landing(provider_name: &str, state: &FlowState) -> String {
    let provider = escape(provider_name);

    let notice = match state {
        FlowState::Failed { message, .. } => format!(
            r#"<p class="note" role="alert">{}</p>"#,
            escape(message)
        ),
        _ => String::new(),
    };

    let body = format!(
        r#"<div class="card">
<h1>OpenID Connect Authentication</h1>
<p>Secure authentication with {provider} as the Identity Provider.</p>
{notice}
<p><a class="button" href="/auth/login">Sign in with {provider}</a></p>
</div>
<div class="card">
<h2>How it works</h2>
<ol>
<li><strong>Redirect</strong> &mdash; you are sent to {provider}&#39;s secure authentication page.</li>
<li><strong>Authenticate</strong> &mdash; sign in with your {provider} account credentials.</li>
<li><strong>Access granted</strong> &mdash; you return here with a verified identity token.</li>
</ol>
<p class="muted">No password is stored by this application; authentication is
delegated to the Identity Provider, and the returned token is verified
locally (signature, issuer, audience, expiry and nonce).</p>
</div>"#
    );

    shell("OpenID Connect Authentication", &body)
}

/// The signed-in dashboard with the profile card.
#[must_use]
pub fn dashboard(profile: &Profile, provider_name: &str) -> String {
    let signed_in = profile
        .signed_in_at
        .format(&Rfc2822)
        .unwrap_or_else(|_| "N/A".to_string());

    let email = profile.email.as_deref().unwrap_or("N/A");
    let verified = if profile.email_verified {
        "&#10003; Yes"
    } else {
        "&#10007; No"
    };

    let picture = profile
        .picture
        .as_deref()
        .map(|url| {
            format!(
                r#"<img src="{}" alt="{}" width="96" height="96" style="border-radius: 50%;">"#,
                escape(url),
                escape(&profile.display_name)
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"<div class="card">
<h1>Welcome to your dashboard</h1>
<p>You have successfully authenticated using OpenID Connect.</p>
</div>
<div class="card">
<h2>User profile</h2>
{picture}
<dl>
<dt>Name</dt><dd>{name}</dd>
<dt>Email</dt><dd>{email}</dd>
<dt>Email verified</dt><dd>{verified}</dd>
<dt>Subject</dt><dd><code>{subject}</code></dd>
<dt>Authentication provider</dt><dd>{provider_id}</dd>
<dt>Signed in</dt><dd>{signed_in}</dd>
</dl>
<form method="post" action="/auth/logout">
<button class="button danger" type="submit">Sign out</button>
</form>
</div>
<div class="card note">
<strong>OpenID Connect (OIDC) information</strong>
<p>This session was established with the OpenID Connect protocol, with
{provider} as the Identity Provider. The ID token&#39;s signature, issuer,
audience, validity window and nonce were verified by this application.</p>
</div>"#,
        picture = picture,
        name = escape(&profile.display_name),
        email = escape(email),
        verified = verified,
        subject = escape(&profile.subject),
        provider_id = escape(&profile.provider_id),
        signed_in = escape(&signed_in),
        provider = escape(provider_name),
    );

    shell("Dashboard", &body)
}

/// The sign-in failure page.
#[must_use]
pub fn error_page(kind: &str, message: &str, retryable: bool) -> String {
    let hint = if retryable {
        "This looks temporary; retrying may succeed."
    } else {
        "Please start the sign-in again."
    };

    let body = format!(
        r#"<div class="card">
<h1>Sign-in failed</h1>
<p role="alert">{message}</p>
<p class="muted">Error kind: <code>{kind}</code>. {hint}</p>
<p><a class="button" href="/">Back to sign-in</a></p>
</div>"#,
        message = escape(message),
        kind = escape(kind),
        hint = hint,
    );

    shell("Sign-in failed", &body)
}

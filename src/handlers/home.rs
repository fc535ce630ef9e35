use axum::extract::State;
use axum::response::Html;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;
use tracing::{info, warn};

use crate::error::PortalError;
use crate::router::PortalState;
use crate::service::connection::ConnectionHandle;

pub const DEGRADED_MESSAGE: &str =
    "The service is temporarily degraded. Some content is unavailable right now; please try again shortly.";

/// GET / -> always 200; database-derived content only when the probe connects.
pub async fn home_handler(State(state): State<PortalState>) -> Html<String> {
    let mut handle = ConnectionHandle::default();

    let content = match handle.acquire(&state.manager).await {
        Ok(conn) => {
            state.bootstrap_admin_once(&mut *conn).await;
            home_content(database_time(conn).await)
        }
        Err(reason) => {
            info!(%reason, "database unreachable; rendering degraded page");
            degraded_section()
        }
    };

    handle.release().await;
    Html(render_page(&content))
}

async fn database_time(conn: &mut PgConnection) -> Result<DateTime<Utc>, PortalError> {
    let (now,): (DateTime<Utc>,) = sqlx::query_as("SELECT now()")
        .fetch_one(&mut *conn)
        .await?;
    Ok(now)
}

/// Content for a connected request; a failed page query degrades as well.
fn home_content(now: Result<DateTime<Utc>, PortalError>) -> String {
    match now {
        Ok(now) => connected_section(now),
        Err(e) => {
            warn!(error = %e, "home page query failed; rendering degraded page");
            degraded_section()
        }
    }
}

fn connected_section(now: DateTime<Utc>) -> String {
    format!(
        r#"<p class="status ok">Database connected.</p>
    <p>Server time: <time datetime="{iso}">{display}</time></p>"#,
        iso = now.to_rfc3339(),
        display = now.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

fn degraded_section() -> String {
    format!(r#"<p class="status degraded" role="alert">{DEGRADED_MESSAGE}</p>"#)
}

fn render_page(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>AI for Impact</title>
</head>
<body>
  <main>
    <h1>AI for Impact</h1>
    {content}
  </main>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn degraded_page_carries_message_only() {
        let page = render_page(&degraded_section());
        assert!(page.contains(DEGRADED_MESSAGE));
        assert!(page.contains(r#"class="status degraded""#));
        assert!(!page.contains("Server time"));
    }

    #[test]
    fn connected_page_shows_database_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let page = render_page(&connected_section(now));
        assert!(page.contains("2024-05-01 12:30:00 UTC"));
        assert!(!page.contains(DEGRADED_MESSAGE));
    }

    #[test]
    fn connected_request_with_failed_query_degrades() {
        let err = PortalError::DatabaseError(sqlx::Error::Protocol("closed".to_string()));
        let page = render_page(&home_content(Err(err)));
        assert!(page.contains(DEGRADED_MESSAGE));
        assert!(!page.contains("Server time"));
    }

    #[test]
    fn connected_request_with_time_renders_connected() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let page = render_page(&home_content(Ok(now)));
        assert!(page.contains(r#"class="status ok""#));
        assert!(page.contains("2024-05-01T08:00:00+00:00"));
    }
}

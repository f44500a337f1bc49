//! Search widget actions
//!
//! Drives the search engine's page: region configuration, challenge
//! detection, query submission with human-like typing, result extraction
//! and click-through to the target result.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::tasks::Task;
use crate::AppConfig;

use super::errors::SessionError;
use super::session::SearchSession;

/// Search page selectors
mod selectors {
    pub const SEARCH_FORM: &str = "form[role=\"search\"]";
    pub const SEARCH_INPUT: &str = "form[role=\"search\"] input[name=\"text\"]";
    pub const CHALLENGE_FORM: &str = "form#checkbox-captcha-form";
    pub const RESULTS_CONTAINER: &str = "#search-result";
    pub const VISIT_TARGET: &str = "a[data-visit-target=\"1\"]";
}

/// One extracted search result. Ephemeral; discarded after matching.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SearchResultItem {
    pub title: String,
    pub text: String,
    pub url: String,
}

fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Search-page actions over a live session
pub struct SearchActions;

impl SearchActions {
    /// Set the search widget's region parameter for the task.
    pub async fn set_region(session: &SearchSession, region: &str) -> Result<(), SessionError> {
        debug!("Profile {} setting search region to {}", session.id, region);

        let script = format!(
            r#"(() => {{
                const form = document.querySelector({form});
                if (!form) return false;
                let region = form.querySelector('input[name="lr"]');
                if (!region) {{
                    region = document.createElement('input');
                    region.type = 'hidden';
                    region.name = 'lr';
                    form.appendChild(region);
                }}
                region.value = {value};
                return true;
            }})()"#,
            form = js_str(selectors::SEARCH_FORM),
            value = js_str(region),
        );

        let applied = session.execute_js(&script).await?;
        if applied.as_bool() != Some(true) {
            return Err(SessionError::ElementNotFound("search form not present".into()));
        }

        Ok(())
    }

    /// Check the page for the known challenge-form signature.
    pub async fn check_challenge(session: &SearchSession) -> Result<bool, SessionError> {
        let result = session
            .execute_js_with_timeout(
                &format!(
                    r#"(() => {{
                        if (document.querySelector({form})) {{
                            return {{ blocked: true, kind: 'checkbox_captcha' }};
                        }}
                        const title = (document.title || '').toLowerCase();
                        if (title.includes('are you not a robot') || title.includes('не робот')) {{
                            return {{ blocked: true, kind: 'challenge_title' }};
                        }}
                        return {{ blocked: false }};
                    }})()"#,
                    form = js_str(selectors::CHALLENGE_FORM),
                ),
                5,
            )
            .await?;

        let blocked = result
            .get("blocked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if blocked {
            let kind = result.get("kind").and_then(|v| v.as_str()).unwrap_or("unknown");
            warn!("Profile {} challenge page detected: {}", session.id, kind);
        }

        Ok(blocked)
    }

    /// Type a query into the search input and submit it, then wait for the
    /// results container. The retry path clears the previous query first.
    pub async fn submit_query(
        session: &SearchSession,
        query: &str,
        first_try: bool,
        config: &AppConfig,
    ) -> Result<(), SessionError> {
        info!(
            "Profile {} searching: {} ({})",
            session.id,
            query,
            if first_try { "first try" } else { "retry" }
        );

        if !first_try {
            let cleared = session
                .execute_js(&format!(
                    r#"(() => {{
                        const input = document.querySelector({input});
                        if (!input) return false;
                        input.focus();
                        input.value = '';
                        input.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        return true;
                    }})()"#,
                    input = js_str(selectors::SEARCH_INPUT),
                ))
                .await?;

            if cleared.as_bool() != Some(true) {
                return Err(SessionError::ElementNotFound("search input not present".into()));
            }

            tokio::time::sleep(Duration::from_millis(1000)).await;
        }

        session.click(selectors::SEARCH_INPUT).await?;
        session.type_chars(query, config.typing_delay_ms).await?;

        // think a moment before confirming
        tokio::time::sleep(Duration::from_millis(config.think_time_ms)).await;
        session.press_enter().await?;

        session
            .wait_for_selector(selectors::RESULTS_CONTAINER, config.results_timeout_ms)
            .await?;
        tokio::time::sleep(Duration::from_millis(config.results_settle_ms)).await;

        Ok(())
    }

    /// Extract all result items from the rendered results list.
    pub async fn collect_results(
        session: &SearchSession,
    ) -> Result<Vec<SearchResultItem>, SessionError> {
        let value = session
            .execute_js(
                r#"(() => {
                    const items = document.querySelectorAll('#search-result .serp-item');
                    return Array.from(items).map((element) => {
                        const title = element.querySelector('.organic__title');
                        const text = element.querySelector('.organic__text');
                        const link = element.querySelector('a');
                        return {
                            title: title ? title.textContent : '',
                            text: text ? text.textContent : '',
                            url: link ? (link.getAttribute('href') || '').toLowerCase().slice(0, 50) : '',
                        };
                    });
                })()"#,
            )
            .await?;

        let items: Vec<SearchResultItem> = serde_json::from_value(value)
            .map_err(|e| SessionError::JavaScriptError(format!("bad result items: {}", e)))?;

        debug!("Profile {} collected {} result items", session.id, items.len());
        Ok(items)
    }

    /// Click through to the matched result and adopt the page it spawns.
    pub async fn open_target(
        session: &mut SearchSession,
        target_url: &str,
        config: &AppConfig,
    ) -> Result<(), SessionError> {
        // tag the matching anchor so the driver can issue a trusted click on it
        let tagged = session
            .execute_js(&format!(
                r#"(() => {{
                    const needle = {needle};
                    const links = document.querySelectorAll('#search-result .serp-item a[href]');
                    for (const link of links) {{
                        const href = (link.getAttribute('href') || '').toLowerCase();
                        if (href.includes(needle)) {{
                            link.setAttribute('data-visit-target', '1');
                            link.scrollIntoView({{ block: 'center' }});
                            return true;
                        }}
                    }}
                    return false;
                }})()"#,
                needle = js_str(&target_url.to_lowercase()),
            ))
            .await?;

        if tagged.as_bool() != Some(true) {
            return Err(SessionError::ElementNotFound(format!(
                "result link for {} not found",
                target_url
            )));
        }

        let known = session.page_targets().await?;
        session.click(selectors::VISIT_TARGET).await?;
        session
            .adopt_spawned_page(&known, Duration::from_millis(config.page_spawn_timeout_ms))
            .await?;

        // wait for the visited page body to render
        session
            .wait_for_selector("body", config.render_timeout_ms)
            .await
            .map_err(|_| SessionError::NavigationTimeout("target page did not render".into()))?;

        Ok(())
    }
}

/// Scan the ordered result list for the first item whose URL contains the
/// target as a case-insensitive substring.
pub fn find_target<'a>(
    items: &'a [SearchResultItem],
    target_url: &str,
) -> Option<(usize, &'a SearchResultItem)> {
    let needle = target_url.to_lowercase();
    items
        .iter()
        .enumerate()
        .find(|(_, item)| item.url.to_lowercase().contains(&needle))
}

/// Resolve whether the task's URL is present in the results, retrying once
/// with the broadened query on a first-pass miss. `submit` runs one query
/// submission and returns the extracted result items.
pub async fn resolve_target<F, Fut>(
    task: &Task,
    mut submit: F,
) -> Result<(usize, SearchResultItem), SessionError>
where
    F: FnMut(String, bool) -> Fut,
    Fut: Future<Output = Result<Vec<SearchResultItem>, SessionError>>,
{
    let items = submit(task.request.clone(), true).await?;
    if let Some((index, item)) = find_target(&items, &task.url) {
        return Ok((index, item.clone()));
    }

    debug!("No match for {} on first pass, applying broadened query", task.url);
    let broadened = format!("{} {}", task.request, task.additional_request);
    let items = submit(broadened.trim().to_string(), false).await?;
    if let Some((index, item)) = find_target(&items, &task.url) {
        return Ok((index, item.clone()));
    }

    Err(SessionError::TargetNotFound(task.url.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn item(url: &str) -> SearchResultItem {
        SearchResultItem {
            title: "title".into(),
            text: "text".into(),
            url: url.into(),
        }
    }

    fn task(url: &str) -> Task {
        Task {
            url: url.into(),
            request: "red shoes".into(),
            additional_request: "size 10".into(),
            region: "213".into(),
        }
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let items = vec![item("https://Example.com/PAGE")];
        let (index, matched) = find_target(&items, "example.com/page").unwrap();

        assert_eq!(index, 0);
        assert_eq!(matched.url, "https://Example.com/PAGE");
    }

    #[test]
    fn matching_reports_first_hit_index() {
        let items = vec![
            item("https://other.com/a"),
            item("https://shop.com/item?id=1"),
            item("https://shop.com/item?id=2"),
        ];

        let (index, _) = find_target(&items, "shop.com/item").unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn no_match_yields_none() {
        let items = vec![item("https://other.com/a")];
        assert!(find_target(&items, "shop.com").is_none());
    }

    #[tokio::test]
    async fn first_pass_match_skips_the_retry() {
        let submissions = AtomicU32::new(0);

        let result = resolve_target(&task("shop.com"), |query, first_try| {
            submissions.fetch_add(1, Ordering::Relaxed);
            assert!(first_try);
            assert_eq!(query, "red shoes");
            async { Ok(vec![item("https://shop.com/item")]) }
        })
        .await
        .unwrap();

        assert_eq!(result.0, 0);
        assert_eq!(submissions.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn retry_uses_broadened_query_and_its_results() {
        let submissions = AtomicU32::new(0);

        let result = resolve_target(&task("shop.com"), |query, first_try| {
            let attempt = submissions.fetch_add(1, Ordering::Relaxed);
            if attempt == 0 {
                assert!(first_try);
            } else {
                assert!(!first_try);
                assert_eq!(query, "red shoes size 10");
            }
            async move {
                if attempt == 0 {
                    Ok(vec![item("https://other.com/a")])
                } else {
                    Ok(vec![
                        item("https://other.com/a"),
                        item("https://other.com/b"),
                        item("https://shop.com/item"),
                    ])
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.0, 2);
        assert_eq!(submissions.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn retry_happens_at_most_once() {
        let submissions = AtomicU32::new(0);

        let err = resolve_target(&task("shop.com"), |_query, _first_try| {
            submissions.fetch_add(1, Ordering::Relaxed);
            async { Ok(Vec::new()) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SessionError::TargetNotFound(_)));
        assert_eq!(submissions.load(Ordering::Relaxed), 2);
    }
}

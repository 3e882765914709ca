// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-page scripts the convergence driver evaluates.
//!
//! Selectors and phrases are spliced in from `openbox_catalog` as JSON string
//! literals, so the page-side counting and the extractor agree on what a
//! product cell is.

use openbox_catalog::extract::selectors::{CELL, CONTAINER, CONTAINER_CELL, LOAD_MORE_PHRASES};
use std::sync::LazyLock;

fn js(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| panic!("script constant serializes: {e}"))
}

/// Shared helper: the first visible "load more" control, or null.
static FIND_AFFORDANCE: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"const phrases = {phrases};
  const findMore = () => Array.from(document.querySelectorAll('button, a')).find((el) => {{
    const text = (el.textContent || '').toLowerCase().trim();
    return phrases.some((p) => text.includes(p));
  }}) || null;"#,
        phrases = js(&LOAD_MORE_PHRASES),
    )
});

/// `{count, height}`: the larger of the two cell counts and the document
/// height.
pub static SAMPLE: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"(() => {{
  const general = document.querySelectorAll({cell}).length;
  const container = document.querySelectorAll({container_cell}).length;
  return {{ count: Math.max(general, container), height: document.body.scrollHeight }};
}})()"#,
        cell = js(&CELL),
        container_cell = js(&CONTAINER_CELL),
    )
});

/// One loading nudge: scroll ~0.9 viewport (or to the bottom when close),
/// scroll the grid container to its end, bring the last cell into view, then
/// fire the events lazy loaders listen for. Returns `true`.
pub static SCROLL: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"(() => {{
  const current = window.pageYOffset || document.documentElement.scrollTop;
  const max = document.body.scrollHeight - window.innerHeight;
  const step = window.innerHeight * 0.9;
  if (max - current < step) {{
    window.scrollTo(0, document.body.scrollHeight);
  }} else {{
    window.scrollBy(0, step);
  }}
  const container = document.querySelector({container});
  if (container && container.scrollHeight > container.clientHeight) {{
    container.scrollTop = container.scrollHeight;
  }}
  const cells = document.querySelectorAll({cell});
  const last = cells.length > 0 ? cells[cells.length - 1] : null;
  if (last) {{
    last.scrollIntoView({{ behavior: 'smooth', block: 'end' }});
  }}
  window.dispatchEvent(new Event('scroll', {{ bubbles: true }}));
  document.dispatchEvent(new Event('scroll', {{ bubbles: true }}));
  if (last) {{
    last.dispatchEvent(new Event('intersect', {{ bubbles: true }}));
  }}
  return true;
}})()"#,
        container = js(&CONTAINER),
        cell = js(&CELL),
    )
});

/// Click the first "load more" control. Returns whether one was clicked.
pub static CLICK_MORE: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"(() => {{
  {find}
  const more = findMore();
  if (!more) return false;
  more.click();
  return true;
}})()"#,
        find = FIND_AFFORDANCE.as_str(),
    )
});

/// Whether a "load more" control is present, without touching it.
pub static AFFORDANCE_PRESENT: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"(() => {{
  {find}
  return findMore() !== null;
}})()"#,
        find = FIND_AFFORDANCE.as_str(),
    )
});

/// Trailing-pass scroll: straight to the bottom, last cell into view.
pub static FINAL_SCROLL: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"(() => {{
  window.scrollTo(0, document.body.scrollHeight);
  const cells = document.querySelectorAll({cell});
  if (cells.length > 0) {{
    cells[cells.length - 1].scrollIntoView({{ behavior: 'smooth', block: 'end' }});
  }}
  window.dispatchEvent(new Event('scroll', {{ bubbles: true }}));
  return true;
}})()"#,
        cell = js(&CELL),
    )
});

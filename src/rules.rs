//! Built-in platform rules.
//!
//! Each rule names a chat platform, the hostnames it lives on, an
//! optional path prefix for platforms mounted under a path rather than a
//! whole host, and the input selectors to try there, most specific
//! first. The table is ordered: the resolver takes the first match, so
//! path-scoped rules must precede generic rules for the same host.

/// One platform entry in the rule table.
#[derive(Debug)]
pub struct PlatformRule {
    /// Display name, also used in user-facing failure messages.
    pub name: &'static str,
    /// Hostnames the rule applies to, matched on label boundaries
    /// (subdomains included, `www.` already stripped).
    pub hostnames: &'static [&'static str],
    /// Leading path component(s) the page must live under, e.g.
    /// `/i/grok`. `None` matches the whole host.
    pub path_prefix: Option<&'static str>,
    /// Input selectors to probe on this platform, in priority order.
    pub selectors: &'static [&'static str],
}

/// Selectors tried on every page after the platform-specific ones.
pub const FALLBACK_SELECTORS: &[&str] = &["textarea", "[contenteditable=\"true\"]"];

pub static TABLE: &[PlatformRule] = &[
    PlatformRule {
        name: "OpenAI",
        hostnames: &["chatgpt.com", "chat.openai.com", "openai.com"],
        path_prefix: None,
        selectors: &[
            "#prompt-textarea",
            "form textarea",
            ".ProseMirror[contenteditable=\"true\"]",
        ],
    },
    PlatformRule {
        name: "Claude",
        hostnames: &["claude.ai", "console.anthropic.com"],
        path_prefix: None,
        selectors: &[".ProseMirror[contenteditable=\"true\"]"],
    },
    PlatformRule {
        name: "Google Gemini",
        hostnames: &["gemini.google.com"],
        path_prefix: None,
        selectors: &[".ql-editor[contenteditable=\"true\"]"],
    },
    PlatformRule {
        name: "Microsoft AI",
        hostnames: &["bing.com"],
        path_prefix: Some("/chat"),
        selectors: &["#userInput"],
    },
    PlatformRule {
        name: "Microsoft AI",
        hostnames: &["copilot.microsoft.com"],
        path_prefix: None,
        selectors: &["#userInput"],
    },
    PlatformRule {
        name: "Perplexity",
        hostnames: &["perplexity.ai"],
        path_prefix: None,
        selectors: &["#ask-input"],
    },
    PlatformRule {
        name: "X's Grok",
        hostnames: &["x.com"],
        path_prefix: Some("/i/grok"),
        selectors: &["textarea[placeholder=\"Ask anything\"]"],
    },
    PlatformRule {
        name: "Grok",
        hostnames: &["grok.com"],
        path_prefix: None,
        selectors: &[".tiptap[contenteditable=\"true\"]"],
    },
];

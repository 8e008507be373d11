//! Flow identifiers and the session requirements a flow can declare.

use crate::error::CoreError;

define_text_enum! {
    /// Registered automation flows.
    FlowType {
        CrawlSimple = "CRAWL_SIMPLE",
        SauceDemo = "FLOW_SAUCE_DEMO",
    }
}

define_text_enum! {
    /// How a flow's browsing session is authenticated.
    SessionMode {
        NonAuth = "NON_AUTH",
        CookiesAuth = "COOKIES_AUTH",
        FormAuth = "FORM_AUTH",
    }
}

define_text_enum! {
    /// Lifetime of the execution context a flow runs in.
    ContextPer {
        Job = "JOB",
        Item = "ITEM",
    }
}

impl FlowType {
    /// URL-friendly name used by the `/flows` endpoints.
    pub fn slug(self) -> &'static str {
        match self {
            Self::CrawlSimple => "crawl-simple",
            Self::SauceDemo => "sauce-demo",
        }
    }

    pub fn from_slug(slug: &str) -> Result<Self, CoreError> {
        Self::ALL
            .iter()
            .copied()
            .find(|flow| flow.slug() == slug)
            .ok_or_else(|| CoreError::UnsupportedFlow(slug.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn slugs_resolve_back_to_flow_types() {
        for flow in FlowType::ALL {
            assert_eq!(FlowType::from_slug(flow.slug()).unwrap(), *flow);
        }
    }

    #[test]
    fn unknown_slug_is_unsupported() {
        assert_matches!(
            FlowType::from_slug("checkout-v2"),
            Err(CoreError::UnsupportedFlow(s)) if s == "checkout-v2"
        );
    }

    #[test]
    fn flow_type_parses_from_wire_name() {
        assert_eq!(
            "FLOW_SAUCE_DEMO".parse::<FlowType>().unwrap(),
            FlowType::SauceDemo
        );
    }
}

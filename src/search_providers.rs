use crate::host::UrlComponents;
use lazy_static::lazy_static;

pub struct SearchProvider {
    pub name: &'static str,
    pub hostname: &'static str,
}

lazy_static! {
    static ref SEARCH_PROVIDERS: Vec<SearchProvider> = vec![
        SearchProvider { name: "Google", hostname: "google.com" },
        SearchProvider { name: "Bing", hostname: "bing.com" },
        SearchProvider { name: "DuckDuckGo", hostname: "duckduckgo.com" },
        SearchProvider { name: "Yahoo", hostname: "search.yahoo.com" },
        SearchProvider { name: "Brave Search", hostname: "search.brave.com" },
        SearchProvider { name: "Startpage", hostname: "startpage.com" },
        SearchProvider { name: "Ecosia", hostname: "ecosia.org" },
        SearchProvider { name: "Qwant", hostname: "qwant.com" },
        SearchProvider { name: "Yandex", hostname: "yandex.com" },
        SearchProvider { name: "Baidu", hostname: "baidu.com" },
        SearchProvider { name: "Mojeek", hostname: "mojeek.com" },
    ];
}

/// Whether the URL belongs to a known search engine, matched on the
/// hostname (exact or subdomain).
pub fn is_search_engine(components: &UrlComponents) -> bool {
    if components.hostname.is_empty() {
        return false;
    }

    SEARCH_PROVIDERS.iter().any(|provider| {
        components.hostname == provider.hostname
            || components
                .hostname
                .ends_with(&format!(".{}", provider.hostname))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components_for(hostname: &str) -> UrlComponents {
        UrlComponents {
            scheme: "https".to_string(),
            hostname: hostname.to_string(),
            path: "/search".to_string(),
            query: "q=test".to_string(),
        }
    }

    #[test]
    fn test_known_search_engines() {
        assert!(is_search_engine(&components_for("www.google.com")));
        assert!(is_search_engine(&components_for("google.com")));
        assert!(is_search_engine(&components_for("duckduckgo.com")));
        assert!(is_search_engine(&components_for("search.brave.com")));
        assert!(is_search_engine(&components_for("search.yahoo.com")));
    }

    #[test]
    fn test_non_search_hosts() {
        assert!(!is_search_engine(&components_for("www.example.com")));
        assert!(!is_search_engine(&components_for("notgoogle.com")));
        assert!(!is_search_engine(&components_for("")));
    }
}

use std::collections::HashMap;

use crate::content_index::PostFilter;

#[derive(PartialEq, Debug)]
pub struct QueryString {
    items: HashMap<String, String>,
}

impl QueryString {
    pub fn from(buf: &str) -> Self {
        let vs: Vec<(String, String)> = serde_urlencoded::from_str(buf).unwrap_or_else(|_| vec![]);
        let items: HashMap<String, String> = vs.into_iter().collect();

        QueryString {
            items,
        }
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Missing, unparseable or values below 1 give the first page.
    pub fn get_page(&self) -> usize {
        self.get("page")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1)
    }

    /// `None` disables paging.
    pub fn get_limit(&self) -> Option<usize> {
        self.get("limit")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
    }

    pub fn to_filter(&self) -> PostFilter {
        PostFilter {
            tag: self.get("tag").map(str::to_string),
            category: self.get("category").map(str::to_string),
            search: self.get("search").map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_page() {
        assert_eq!(QueryString::from("page=3").get_page(), 3);
        assert_eq!(QueryString::from("page=0").get_page(), 1);
        assert_eq!(QueryString::from("page=-2").get_page(), 1);
        assert_eq!(QueryString::from("page=abc").get_page(), 1);
        assert_eq!(QueryString::from("").get_page(), 1);
    }

    #[test]
    fn test_get_limit() {
        assert_eq!(QueryString::from("limit=10").get_limit(), Some(10));
        assert_eq!(QueryString::from("limit=0").get_limit(), None);
        assert_eq!(QueryString::from("limit=ten").get_limit(), None);
        assert_eq!(QueryString::from("page=2").get_limit(), None);
    }

    #[test]
    fn test_to_filter() {
        let filter = QueryString::from("tag=react&search=type%20script&category=").to_filter();
        assert_eq!(filter.tag.as_deref(), Some("react"));
        assert_eq!(filter.search.as_deref(), Some("type script"));
        assert_eq!(filter.category, None);
    }

    #[test]
    fn test_parse_query_str() {
        let buf = "bread=baguette&cheese=comt%C3%A9&meat=ham";
        let meal = vec![
            ("bread".to_owned(), "baguette".to_owned()),
            ("cheese".to_owned(), "comté".to_owned()),
            ("meat".to_owned(), "ham".to_owned()),
        ].into_iter().collect::<HashMap<_, _>>();

        assert_eq!(QueryString::from(buf), QueryString { items: meal });
    }

    #[test]
    fn test_parse_key_only_query_str() {
        let qs = QueryString::from("key-only");
        assert_eq!(qs.items.get("key-only").map(|v| v.as_str()), Some(""));
        assert_eq!(qs.get("key-only"), None);
    }
}

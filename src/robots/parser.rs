//! Robots.txt rules backed by the robotstxt crate's matcher

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
///
/// Path rules are evaluated by `robotstxt::DefaultMatcher`; the matcher has no
/// notion of `Crawl-delay`, so that directive is read separately.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    content: Option<String>,
}

/// One `User-agent` group and its crawl delay
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// Rules that permit everything (used when the file cannot be obtained)
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    pub fn is_allow_all(&self) -> bool {
        self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }

    /// Checks if a URL is allowed for the given user agent token
    ///
    /// `url` may be absolute or a path; the matcher only looks at path and query.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.content.as_deref() {
            Some(content) if !content.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
            _ => true,
        }
    }

    /// Gets the crawl delay (seconds) that applies to the given user agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let content = self.content.as_deref()?;
        let agent = user_agent.to_lowercase();

        let mut specific = None;
        let mut wildcard = None;
        for group in parse_groups(content) {
            let Some(delay) = group.crawl_delay else {
                continue;
            };
            if group.agents.iter().any(|a| a != "*" && agent.contains(a.as_str())) {
                specific = specific.or(Some(delay));
            } else if group.agents.iter().any(|a| a == "*") {
                wildcard = wildcard.or(Some(delay));
            }
        }

        specific.or(wildcard)
    }
}

fn parse_groups(content: &str) -> Vec<AgentGroup> {
    let mut groups: Vec<AgentGroup> = Vec::new();
    let mut in_agent_lines = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        if key == "user-agent" {
            // consecutive User-agent lines share one group
            if !in_agent_lines {
                groups.push(AgentGroup {
                    agents: Vec::new(),
                    crawl_delay: None,
                });
            }
            if let Some(group) = groups.last_mut() {
                group.agents.push(value.to_lowercase());
            }
            in_agent_lines = true;
            continue;
        }

        in_agent_lines = false;
        if key == "crawl-delay" {
            if let (Some(group), Ok(delay)) = (groups.last_mut(), value.parse::<f64>()) {
                group.crawl_delay = Some(delay);
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allow_all());
        assert!(robots.is_allowed("/lotes/detalhes/1", "lot-harvest"));
    }

    #[test]
    fn test_disallow_login_area() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /ssc/\n");
        assert!(robots.is_allowed("/leilao/2842", "lot-harvest"));
        assert!(!robots.is_allowed("/ssc/login/login", "lot-harvest"));
        assert!(!robots.is_allowed("https://example.com/ssc/x", "lot-harvest"));
    }

    #[test]
    fn test_agent_specific_group() {
        let content = "User-agent: lot-harvest\nDisallow: /api/\n\nUser-agent: *\nAllow: /\n";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/api/lotes", "lot-harvest"));
        assert!(robots.is_allowed("/api/lotes", "OtherBot"));
    }

    #[test]
    fn test_garbage_allows_everything() {
        let robots = ParsedRobots::from_content("<html>not a robots file</html>");
        assert!(robots.is_allowed("/any/path", "lot-harvest"));
    }

    #[test]
    fn test_empty_file_is_allow_all() {
        let robots = ParsedRobots::from_content("  \n");
        assert!(robots.is_allow_all());
        assert!(robots.is_allowed("/", "lot-harvest"));
    }

    #[test]
    fn test_crawl_delay_prefers_specific_agent() {
        let content = "User-agent: lot-harvest\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10\n";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("lot-harvest"), Some(5.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let content = "User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3\nDisallow: /x\n";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("BotA"), Some(3.0));
        assert_eq!(robots.crawl_delay("botb"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_after_other_directives() {
        let content = "User-agent: *\nDisallow: /admin\nCrawl-delay: 2.5 # be gentle\n";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("lot-harvest"), Some(2.5));
    }

    #[test]
    fn test_no_crawl_delay() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin\n");
        assert_eq!(robots.crawl_delay("lot-harvest"), None);
        assert_eq!(ParsedRobots::allow_all().crawl_delay("lot-harvest"), None);
    }
}

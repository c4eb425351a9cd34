use regex::Regex;

use crate::config::ConfigError;

/// Exclude/include path rules. Exclusion always wins; anything not explicitly
/// included is rejected.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    exclude: Vec<Regex>,
    include: Vec<Regex>,
}

impl PathFilter {
    pub fn new(exclude: Vec<Regex>, include: Vec<Regex>) -> Self {
        Self { exclude, include }
    }

    pub fn from_patterns<E, I>(exclude: E, include: I) -> Result<Self, ConfigError>
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Ok(Self {
            exclude: compile_all(exclude)?,
            include: compile_all(include)?,
        })
    }

    pub fn is_eligible(&self, path: &str) -> bool {
        if self.exclude.iter().any(|pattern| pattern.is_match(path)) {
            return false;
        }
        self.include.iter().any(|pattern| pattern.is_match(path))
    }
}

fn compile_all<P>(patterns: P) -> Result<Vec<Regex>, ConfigError>
where
    P: IntoIterator,
    P::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(pattern).map_err(|err| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::PathFilter;
    use crate::config::ConfigError;

    fn filter(exclude: &[&str], include: &[&str]) -> PathFilter {
        PathFilter::from_patterns(exclude, include).unwrap()
    }

    #[test]
    fn exclude_wins_over_include() {
        let f = filter(&["^/private"], &["^/"]);
        assert!(!f.is_eligible("/private/notes.html"));
        assert!(f.is_eligible("/public/notes.html"));
    }

    #[test]
    fn default_is_deny() {
        let f = filter(&[], &["\\.html$"]);
        assert!(!f.is_eligible("/image.png"));
        assert!(!filter(&[], &[]).is_eligible("/index.html"));
    }

    #[test]
    fn include_order_does_not_matter_for_outcome() {
        let f = filter(&[], &["^/docs", "^/blog"]);
        assert!(f.is_eligible("/blog/post"));
        assert!(f.is_eligible("/docs/intro"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = PathFilter::from_patterns(["("], ["^/"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref pattern, .. } if pattern == "("));
    }
}

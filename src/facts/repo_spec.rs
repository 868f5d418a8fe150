use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use std::sync::Arc;
use url::Url;

/// Owner and name of a hosted source repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSpec {
    url: Arc<Url>,
    owner: Arc<str>,
    repo: Arc<str>,
}

impl RepoSpec {
    /// Parse a repository URL, taking the final two path segments as owner and repository name.
    ///
    /// A trailing `.git` on the repository name and a trailing `/` on the path are ignored.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).into_app_err_with(|| format!("invalid repository URL '{url}'"))?;

        let path_segments: Vec<_> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let [.., owner, repo] = path_segments.as_slice() else {
            bail!("repository URL '{url}' does not name an owner and a repository");
        };

        let repo = repo.trim_end_matches(".git");
        if repo.is_empty() {
            bail!("repository URL '{url}' has an empty repository name");
        }

        let host = parsed.host_str().unwrap_or_default();
        let clean_url =
            Url::parse(&format!("{}://{host}/{owner}/{repo}", parsed.scheme())).into_app_err("reconstructing repository URL")?;

        Ok(Self {
            url: Arc::new(clean_url),
            owner: Arc::from(*owner),
            repo: Arc::from(repo),
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

impl Display for RepoSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_url() {
        let spec = RepoSpec::parse("https://github.com/expressjs/express").unwrap();
        assert_eq!(spec.owner(), "expressjs");
        assert_eq!(spec.repo(), "express");
        assert_eq!(spec.url().as_str(), "https://github.com/expressjs/express");
    }

    #[test]
    fn test_parse_url_with_git_extension() {
        let spec = RepoSpec::parse("https://github.com/o/r.git").unwrap();
        assert_eq!(spec.owner(), "o");
        assert_eq!(spec.repo(), "r");
    }

    #[test]
    fn test_parse_url_with_trailing_slash() {
        let spec = RepoSpec::parse("https://github.com/lodash/lodash/").unwrap();
        assert_eq!(spec.owner(), "lodash");
        assert_eq!(spec.repo(), "lodash");
    }

    #[test]
    fn test_parse_uses_final_two_segments() {
        let spec = RepoSpec::parse("https://git.example.org/group/sub/project").unwrap();
        assert_eq!(spec.owner(), "sub");
        assert_eq!(spec.repo(), "project");
    }

    #[test]
    fn test_parse_invalid_url_only_owner() {
        let _ = RepoSpec::parse("https://github.com/expressjs").unwrap_err();
    }

    #[test]
    fn test_parse_invalid_url_bare_git_suffix() {
        let _ = RepoSpec::parse("https://github.com/o/.git").unwrap_err();
    }

    #[test]
    fn test_parse_not_a_url() {
        let _ = RepoSpec::parse("not a url").unwrap_err();
    }

    #[test]
    fn test_display_trait() {
        let spec = RepoSpec::parse("https://github.com/tokio-rs/tokio").unwrap();
        assert_eq!(spec.to_string(), "tokio-rs/tokio");
    }
}

//! Configuration loading from callscope.toml and pyproject.toml.
//!
//! Follows conventions from ruff, black, mypy for familiarity:
//! - Standalone callscope.toml in the working directory
//! - `[tool.callscope]` section in pyproject.toml, searched upwards
//!
//! ## Example
//!
//! ```toml
//! [tool.callscope.resolver]
//! max-candidates = 8
//! generic-names = ["dispatch"]
//!
//! [tool.callscope.centrality]
//! damping = 0.9
//!
//! [tool.callscope.validation]
//! strict = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analysis::{AnalysisConfig, CentralityConfig, CliqueConfig, CommunityConfig};
use crate::callgraph::ResolverConfig;
use crate::error::ConfigError;
use crate::graph::BuilderConfig;
use crate::pipeline::PipelineConfig;

pub const CONFIG_FILE: &str = "callscope.toml";

/// Callscope configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Source file for this config (for display).
    pub source: Option<PathBuf>,
    pub resolver: ResolverConfig,
    pub graph: BuilderConfig,
    pub centrality: CentralityConfig,
    pub community: CommunityConfig,
    pub cliques: CliqueConfig,
    /// Fail the run on structural payload errors.
    pub strict: bool,
}

/// Raw config as deserialized from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    resolver: Option<RawResolver>,
    graph: Option<RawGraph>,
    centrality: Option<RawCentrality>,
    community: Option<RawCommunity>,
    cliques: Option<RawCliques>,
    validation: Option<RawValidation>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawResolver {
    max_candidates: Option<usize>,
    generic_names: Option<Vec<String>>,
    resolve_namespace_members: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawGraph {
    call_site_cap: Option<usize>,
    keep_dangling: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawCentrality {
    damping: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawCommunity {
    max_levels: Option<usize>,
    max_passes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawCliques {
    max_cliques: Option<usize>,
    min_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawValidation {
    strict: Option<bool>,
}

/// Wrapper for pyproject.toml structure.
#[derive(Debug, Deserialize)]
struct PyProject {
    tool: Option<PyProjectTool>,
}

#[derive(Debug, Deserialize)]
struct PyProjectTool {
    callscope: Option<RawConfig>,
}

impl Config {
    /// Load configuration for a run started in `directory`.
    ///
    /// Search order:
    /// 1. callscope.toml in directory
    /// 2. pyproject.toml [tool.callscope] in directory
    /// 3. Walk up to find pyproject.toml (like ruff)
    /// 4. Default config if nothing found
    ///
    /// A file that exists but cannot be read or parsed is an error, not a
    /// silent fallback.
    pub fn load(directory: &Path) -> Result<Self, ConfigError> {
        let standalone = directory.join(CONFIG_FILE);
        if standalone.is_file() {
            return Self::load_file(&standalone);
        }

        for dir in directory.ancestors() {
            let pyproject = dir.join("pyproject.toml");
            if pyproject.is_file() {
                if let Some(config) = Self::load_pyproject(&pyproject)? {
                    return Ok(config);
                }
            }
        }

        Ok(Self::default())
    }

    /// Load an explicit config file (`--config`).
    ///
    /// A `pyproject.toml` is read through its `[tool.callscope]` table; any
    /// other file is read as a standalone config.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if path.file_name().is_some_and(|n| n == "pyproject.toml") {
            return Ok(Self::load_pyproject(path)?.unwrap_or_else(|| Self {
                source: Some(path.to_path_buf()),
                ..Self::default()
            }));
        }
        let content = read(path)?;
        let raw: RawConfig = parse(path, &content)?;
        Ok(Self::from_raw(raw, path.to_path_buf()))
    }

    fn load_pyproject(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = read(path)?;
        let pyproject: PyProject = parse(path, &content)?;
        Ok(pyproject
            .tool
            .and_then(|tool| tool.callscope)
            .map(|raw| Self::from_raw(raw, path.to_path_buf())))
    }

    fn from_raw(raw: RawConfig, source: PathBuf) -> Self {
        let mut config = Self {
            source: Some(source),
            ..Self::default()
        };

        if let Some(r) = raw.resolver {
            let resolver = &mut config.resolver;
            resolver.max_candidates = r.max_candidates.unwrap_or(resolver.max_candidates);
            resolver.resolve_namespace_members = r
                .resolve_namespace_members
                .unwrap_or(resolver.resolve_namespace_members);
            resolver.generic_names = r.generic_names.unwrap_or_default();
        }
        if let Some(g) = raw.graph {
            config.graph.call_site_cap = g.call_site_cap.unwrap_or(config.graph.call_site_cap);
            config.graph.keep_dangling = g.keep_dangling.unwrap_or(config.graph.keep_dangling);
        }
        if let Some(c) = raw.centrality {
            let centrality = &mut config.centrality;
            centrality.damping = c.damping.unwrap_or(centrality.damping);
            centrality.tolerance = c.tolerance.unwrap_or(centrality.tolerance);
            centrality.max_iterations = c.max_iterations.unwrap_or(centrality.max_iterations);
        }
        if let Some(c) = raw.community {
            config.community.max_levels = c.max_levels.unwrap_or(config.community.max_levels);
            config.community.max_passes = c.max_passes.unwrap_or(config.community.max_passes);
        }
        if let Some(c) = raw.cliques {
            config.cliques.max_cliques = c.max_cliques.unwrap_or(config.cliques.max_cliques);
            config.cliques.min_size = c.min_size.unwrap_or(config.cliques.min_size);
        }
        if let Some(v) = raw.validation {
            config.strict = v.strict.unwrap_or(config.strict);
        }

        config
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            centrality: self.centrality.clone(),
            community: self.community.clone(),
            cliques: self.cliques.clone(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            resolver: self.resolver.clone(),
            builder: self.graph.clone(),
            analysis: self.analysis_config(),
            strict: self.strict,
        }
    }

    /// Format config for verbose display.
    pub fn display_summary(&self) -> String {
        let mut lines = Vec::new();

        if let Some(ref source) = self.source {
            lines.push(format!("   Config: {}", source.display()));
        } else {
            lines.push("   Config: (defaults)".to_string());
        }

        lines.push(format!(
            "   Resolver: max {} candidates, namespace members {}",
            self.resolver.max_candidates,
            if self.resolver.resolve_namespace_members { "on" } else { "off" }
        ));
        if !self.resolver.generic_names.is_empty() {
            let names = &self.resolver.generic_names;
            if names.len() <= 3 {
                lines.push(format!("   Generic names: {}", names.join(", ")));
            } else {
                lines.push(format!(
                    "   Generic names: {}, ... (+{} more)",
                    names[..2].join(", "),
                    names.len() - 2
                ));
            }
        }
        lines.push(format!(
            "   Graph: call-site cap {}, keep dangling {}",
            self.graph.call_site_cap, self.graph.keep_dangling
        ));
        lines.push(format!(
            "   PageRank: damping {}, tolerance {:e}, max {} iterations",
            self.centrality.damping, self.centrality.tolerance, self.centrality.max_iterations
        ));
        lines.push(format!(
            "   Cliques: max {}, min size {}",
            self.cliques.max_cliques, self.cliques.min_size
        ));
        if self.strict {
            lines.push("   Validation: strict".to_string());
        }

        lines.join("\n")
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path, content: &str) -> Result<T, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_nothing_found() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.resolver.max_candidates, 12);
        assert_eq!(config.cliques.max_cliques, 1000);
        assert!(!config.strict);
    }

    #[test]
    fn test_standalone_file_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("callscope.toml"),
            "[resolver]\nmax-candidates = 4\ngeneric-names = [\"dispatch\"]\n\n[validation]\nstrict = true\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[tool.callscope.resolver]\nmax-candidates = 99\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.resolver.max_candidates, 4);
        assert_eq!(config.resolver.generic_names, vec!["dispatch"]);
        assert!(config.strict);
        assert_eq!(config.graph.call_site_cap, 100);
    }

    #[test]
    fn test_pyproject_found_in_parent() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[project]\nname = \"demo\"\n\n[tool.callscope.centrality]\ndamping = 0.9\n\n[tool.callscope.cliques]\nmin-size = 3\n",
        )
        .unwrap();
        let nested = dir.path().join("pkg").join("sub");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::load(&nested).unwrap();
        assert_eq!(config.centrality.damping, 0.9);
        assert_eq!(config.cliques.min_size, 3);
        assert_eq!(config.source.as_deref(), Some(dir.path().join("pyproject.toml").as_path()));
    }

    #[test]
    fn test_pyproject_without_section_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[tool.ruff]\nline-length = 100\n").unwrap();
        let config = Config::load_file(&dir.path().join("pyproject.toml")).unwrap();
        assert_eq!(config.resolver.max_candidates, 12);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("callscope.toml");
        fs::write(&path, "[resolver]\nmax-candidatez = 3\n").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Parse { .. })));

        let missing = Config::load_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_pipeline_config_carries_sections() {
        let config = Config {
            strict: true,
            ..Default::default()
        };
        let pipeline = config.pipeline_config();
        assert!(pipeline.strict);
        assert_eq!(pipeline.analysis.centrality.max_iterations, 100);
        assert!(config.display_summary().contains("(defaults)"));
    }
}

//! Runtime classification for `devrig-detector`.
//!
//! [`classify`] inspects marker files in a project root and returns exactly one
//! runtime tag, or [`Classification::Unknown`]. Rules are evaluated top-down
//! from [`RULES`]; the first rule whose marker is present wins. Framework
//! markers (composer/artisan/WordPress) sit above every generic language
//! marker, and generic entry-point scripts sit at the bottom, where their
//! contents must look like the suspected language before they count.
//!
//! Classification only reads the directory. It is a pure function of the
//! marker-file set at call time.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub use devrig_core::types::RuntimeTag;

/// How many leading lines of a generic entry point are inspected.
const ENTRY_POINT_SCAN_LINES: usize = 20;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outcome of classifying a project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "runtime")]
pub enum Classification {
    Classified(RuntimeTag),
    /// No rule matched. An expected outcome, not a failure.
    Unknown,
}

impl Classification {
    pub fn tag(self) -> Option<RuntimeTag> {
        match self {
            Classification::Classified(tag) => Some(tag),
            Classification::Unknown => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Classified(tag) => tag.fmt(f),
            Classification::Unknown => f.write_str("unknown"),
        }
    }
}

/// Network and image metadata for a runtime's backend container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BackendInfo {
    /// Port published on the host.
    pub external_port: u16,
    /// Port the application listens on inside the container.
    pub internal_port: u16,
    /// Image tag of the per-runtime backend container.
    pub container_tag: &'static str,
}

impl fmt::Display for BackendInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.external_port, self.internal_port, self.container_tag
        )
    }
}

/// Everything known about a project after one classification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectProfile {
    pub name: String,
    pub path: PathBuf,
    pub runtime: Classification,
    /// Informational framework hint (e.g. `"Laravel"`); never affects `runtime`.
    pub framework: Option<String>,
    /// `None` when `runtime` is unknown.
    pub backend: Option<BackendInfo>,
}

/// Errors from runtime classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("project directory not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no backend is defined for runtime 'unknown'")]
    UnknownRuntime,
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ClassifyError {
    ClassifyError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A single `(predicate, tag)` classification rule.
pub struct Rule {
    pub tag: RuntimeTag,
    /// Any one of these files present in the project root triggers the rule.
    pub markers: &'static [&'static str],
    /// Content check for generic entry points. `None` means presence is enough.
    verify: Option<fn(&Path) -> bool>,
}

/// Rules in priority order. Earlier entries always win.
pub static RULES: &[Rule] = &[
    Rule {
        tag: RuntimeTag::Php,
        markers: &[
            "composer.json",
            "artisan",
            "wp-config.php",
            "wp-config-sample.php",
            "wp-includes/version.php",
            "wp-content",
        ],
        verify: None,
    },
    Rule {
        tag: RuntimeTag::Go,
        markers: &["go.mod"],
        verify: None,
    },
    Rule {
        tag: RuntimeTag::Rust,
        markers: &["Cargo.toml"],
        verify: None,
    },
    Rule {
        tag: RuntimeTag::Python,
        markers: &["pyproject.toml", "requirements.txt", "Pipfile", "setup.py"],
        verify: None,
    },
    Rule {
        tag: RuntimeTag::Node,
        markers: &["package.json"],
        verify: None,
    },
    Rule {
        tag: RuntimeTag::Php,
        markers: &["index.php"],
        verify: None,
    },
    Rule {
        tag: RuntimeTag::Python,
        markers: &["main.py", "app.py"],
        verify: Some(looks_like_python),
    },
    Rule {
        tag: RuntimeTag::Node,
        markers: &["index.js", "server.js", "app.js"],
        verify: Some(looks_like_node),
    },
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classify the project directory at `path`.
///
/// Fails with [`ClassifyError::NotFound`] when `path` is missing or not a
/// directory. A directory without any known marker is `Ok(Unknown)`.
pub fn classify(path: &Path) -> Result<Classification, ClassifyError> {
    ensure_project_dir(path)?;

    for rule in RULES {
        for marker in rule.markers {
            let file = path.join(marker);
            if !file.exists() {
                continue;
            }
            match rule.verify {
                Some(verify) if !verify(&file) => {
                    tracing::debug!(
                        file = %file.display(),
                        runtime = %rule.tag,
                        "entry point did not look like the suspected runtime; falling through",
                    );
                }
                _ => return Ok(Classification::Classified(rule.tag)),
            }
        }
    }

    Ok(Classification::Unknown)
}

/// Backend container metadata for a classification.
///
/// Pure lookup; fails with [`ClassifyError::UnknownRuntime`] for `Unknown`.
pub fn backend_info(classification: Classification) -> Result<BackendInfo, ClassifyError> {
    classification
        .tag()
        .map(backend_for)
        .ok_or(ClassifyError::UnknownRuntime)
}

/// Backend container metadata for a declared tag. Port pairs never overlap.
pub fn backend_for(tag: RuntimeTag) -> BackendInfo {
    let (external_port, internal_port, container_tag) = match tag {
        RuntimeTag::Php => (8100, 80, "php"),
        RuntimeTag::Node => (8200, 3000, "node"),
        RuntimeTag::Python => (8300, 8000, "python"),
        RuntimeTag::Go => (8400, 8080, "go"),
        RuntimeTag::Rust => (8500, 8000, "rust"),
    };
    BackendInfo {
        external_port,
        internal_port,
        container_tag,
    }
}

/// Classify `path` and attach backend metadata and a framework hint.
pub fn profile(path: &Path) -> Result<ProjectProfile, ClassifyError> {
    let runtime = classify(path)?;
    let name = path
        .file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned();
    let framework = runtime.tag().and_then(|tag| framework_hint(path, tag));

    Ok(ProjectProfile {
        name,
        path: path.to_path_buf(),
        runtime,
        framework,
        backend: backend_info(runtime).ok(),
    })
}

// ---------------------------------------------------------------------------
// Entry point verification
// ---------------------------------------------------------------------------

fn looks_like_python(file: &Path) -> bool {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    let re = TOKENS.get_or_init(|| {
        Regex::new(
            r"^(#!.*\bpython[0-9.]*\b|\s*(import\s+\w|from\s+[\w.]+\s+import\s|(async\s+)?def\s+\w+\s*\(|class\s+\w+\s*[:(]))",
        )
        .expect("valid python token regex")
    });
    leading_lines_match(file, re)
}

fn looks_like_node(file: &Path) -> bool {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    let re = TOKENS.get_or_init(|| {
        Regex::new(
            r#"(^#!.*\bnode\b|\brequire\(\s*['"]|^\s*import\s.+\sfrom\s|^\s*import\s+['"]|\bmodule\.exports\b|^\s*export\s|^\s*(async\s+)?function\s*\w*\s*\()"#,
        )
        .expect("valid node token regex")
    });
    leading_lines_match(file, re)
}

/// True if any of the first [`ENTRY_POINT_SCAN_LINES`] lines matches `re`.
/// Unreadable or non-UTF-8 files never match.
fn leading_lines_match(file: &Path, re: &Regex) -> bool {
    let Ok(handle) = fs::File::open(file) else {
        return false;
    };
    BufReader::new(handle)
        .lines()
        .take(ENTRY_POINT_SCAN_LINES)
        .map_while(Result::ok)
        .any(|line| re.is_match(&line))
}

// ---------------------------------------------------------------------------
// Framework hints
// ---------------------------------------------------------------------------

fn framework_hint(path: &Path, tag: RuntimeTag) -> Option<String> {
    let hint = match tag {
        RuntimeTag::Php => php_framework(path),
        RuntimeTag::Go => manifest_framework(
            path,
            "go.mod",
            &[
                ("gin-gonic/gin", "Gin"),
                ("labstack/echo", "Echo"),
                ("gofiber/fiber", "Fiber"),
                ("go-chi/chi", "Chi"),
            ],
        ),
        RuntimeTag::Rust => manifest_framework(
            path,
            "Cargo.toml",
            &[
                ("actix-web", "Actix Web"),
                ("axum", "Axum"),
                ("rocket", "Rocket"),
                ("warp", "Warp"),
            ],
        ),
        RuntimeTag::Python => python_framework(path),
        RuntimeTag::Node => node_framework(path),
    };
    hint.map(str::to_string)
}

/// Any one of these (file or directory) marks a WordPress checkout.
const WORDPRESS_MARKERS: &[&str] = &[
    "wp-config.php",
    "wp-config-sample.php",
    "wp-includes/version.php",
    "wp-content",
];

fn php_framework(path: &Path) -> Option<&'static str> {
    if path.join("artisan").exists() {
        return Some("Laravel");
    }
    if WORDPRESS_MARKERS.iter().any(|m| path.join(m).exists()) {
        return Some("WordPress");
    }
    manifest_framework(
        path,
        "composer.json",
        &[
            ("laravel/framework", "Laravel"),
            ("symfony/framework-bundle", "Symfony"),
            ("johnpbloch/wordpress", "WordPress"),
            ("slim/slim", "Slim"),
            ("cakephp/cakephp", "CakePHP"),
            ("codeigniter4/framework", "CodeIgniter"),
        ],
    )
}

fn python_framework(path: &Path) -> Option<&'static str> {
    const FRAMEWORKS: &[(&str, &str)] = &[
        ("fastapi", "FastAPI"),
        ("django", "Django"),
        ("flask", "Flask"),
        ("starlette", "Starlette"),
    ];
    ["requirements.txt", "pyproject.toml", "Pipfile", "setup.py"]
        .iter()
        .find_map(|manifest| manifest_framework(path, manifest, FRAMEWORKS))
        .or_else(|| path.join("manage.py").exists().then_some("Django"))
}

fn node_framework(path: &Path) -> Option<&'static str> {
    let content = fs::read_to_string(path.join("package.json")).ok()?;
    let json: serde_json::Value = match serde_json::from_str(&content) {
        Ok(json) => json,
        Err(err) => {
            tracing::debug!(error = %err, "package.json is not valid JSON; no framework hint");
            return None;
        }
    };
    let deps = collect_package_json_deps(&json);
    [
        ("next", "Next.js"),
        ("nuxt", "Nuxt"),
        ("@nestjs/core", "NestJS"),
        ("express", "Express"),
        ("fastify", "Fastify"),
        ("koa", "Koa"),
    ]
    .into_iter()
    .find(|(dep, _)| deps.contains(*dep))
    .map(|(_, name)| name)
}

/// First framework whose needle appears (case-insensitively) in `manifest`.
fn manifest_framework(
    path: &Path,
    manifest: &str,
    frameworks: &[(&str, &'static str)],
) -> Option<&'static str> {
    let lower = fs::read_to_string(path.join(manifest)).ok()?.to_lowercase();
    frameworks
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, name)| *name)
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn ensure_project_dir(path: &Path) -> Result<(), ClassifyError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ClassifyError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ClassifyError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(io_err(path, err)),
    }
}

fn collect_package_json_deps(json: &serde_json::Value) -> HashSet<String> {
    let mut deps = HashSet::new();
    for key in &["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(obj) = json.get(key).and_then(|v| v.as_object()) {
            for k in obj.keys() {
                deps.insert(k.clone());
            }
        }
    }
    deps
}

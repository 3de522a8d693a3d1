use std::path::Path;
use std::sync::LazyLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sidekick_core::memory::ProjectFingerprint;
use walkdir::{DirEntry, WalkDir};

/// How deep below the project root markers are searched.
const MAX_DEPTH: usize = 4;
/// Stop scanning after this many entries; large trees get a partial answer.
const MAX_ENTRIES: usize = 5_000;

const SKIP_DIRS: &[&str] = &[
    ".git", "node_modules", "target", "dist", "build", ".venv", "venv", "vendor", "__pycache__",
];

/// Marker file pattern → (language, framework).
const MARKERS: &[(&str, &str, Option<&str>)] = &[
    ("package.json", "js", Some("node")),
    ("requirements.txt", "python", None),
    ("pyproject.toml", "python", None),
    ("Cargo.toml", "rust", None),
    ("go.mod", "go", None),
    ("pom.xml", "java", Some("maven")),
    ("build.gradle", "java", Some("gradle")),
    ("composer.json", "php", None),
    ("Gemfile", "ruby", None),
    ("*.csproj", "csharp", None),
    ("tsconfig.json", "typescript", None),
    ("next.config.{js,mjs,ts}", "js", Some("nextjs")),
    ("vite.config.{js,mjs,ts}", "js", Some("vite")),
    ("webpack.config.js", "js", Some("webpack")),
];

/// Conventional test locations, matched against paths relative to the root.
const TEST_PATTERNS: &[&str] = &[
    "**/test",
    "**/tests",
    "**/__tests__",
    "**/spec",
    "**/test_*.py",
    "**/*_test.py",
    "**/*_test.go",
    "**/*.{test,spec}.{js,jsx,ts,tsx}",
];

static MARKER_SET: LazyLock<GlobSet> = LazyLock::new(|| build_set(MARKERS.iter().map(|m| m.0)));
static TEST_SET: LazyLock<GlobSet> = LazyLock::new(|| build_set(TEST_PATTERNS.iter().copied()));

fn build_set<'a>(patterns: impl Iterator<Item = &'a str>) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        match Glob::new(p) {
            Ok(g) => {
                builder.add(g);
            }
            Err(e) => tracing::warn!(pattern = p, error = %e, "skipping invalid glob"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| SKIP_DIRS.contains(&n))
}

/// Scan the tree under `root` and describe its stack.
pub fn fingerprint(root: &Path) -> ProjectFingerprint {
    let mut fp = ProjectFingerprint::default();

    let walker = WalkDir::new(root)
        .max_depth(MAX_DEPTH)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
        .take(MAX_ENTRIES);

    for entry in walker {
        if entry.depth() == 0 {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if !fp.has_tests && TEST_SET.is_match(rel) {
            fp.has_tests = true;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        for idx in MARKER_SET.matches(entry.file_name()) {
            let (_, lang, framework) = MARKERS[idx];
            add_unique(&mut fp.languages, lang);
            if let Some(fw) = framework {
                add_unique(&mut fp.frameworks, fw);
            }
        }
    }

    fp.project_type = project_type(root, &fp).to_string();
    fp
}

fn add_unique(list: &mut Vec<String>, tag: &str) {
    if !list.iter().any(|t| t == tag) {
        list.push(tag.to_string());
    }
}

/// First matching rule wins.
fn project_type(root: &Path, fp: &ProjectFingerprint) -> &'static str {
    let fw = |f: &str| fp.frameworks.iter().any(|x| x == f);
    let lang = |l: &str| fp.languages.iter().any(|x| x == l);

    if fw("nextjs") {
        "Next.js web app"
    } else if fw("vite") || fw("webpack") {
        "Frontend web app"
    } else if fw("node") && root.join("server.js").exists() {
        "Node.js server"
    } else if lang("python") {
        if root.join("manage.py").exists() {
            "Django app"
        } else if root.join("app.py").exists() {
            "Flask/Python app"
        } else {
            "Python project"
        }
    } else if lang("rust") {
        "Rust project"
    } else if lang("go") {
        "Go project"
    } else if fw("node") {
        "Node.js project"
    } else if lang("java") {
        "Java project"
    } else {
        "unknown"
    }
}

use crate::model::{Package, PackageKind};

use super::buildinfo::BuildInfo;
use super::{REPOSITORY_HINT, STDLIB};

/// Namespace key scoping packages to the binary at `path`.
pub fn package_db(path: &str) -> String {
    format!("golang:{path}")
}

/// Packages declared by one binary: the main module, the toolchain's standard
/// library, then every dependency in build-info order.
///
/// Versions are passed through untouched (an empty main module version stays
/// empty) and duplicate dependencies are kept.
pub fn packages_for(path: &str, info: &BuildInfo) -> Vec<Package> {
    let db = package_db(path);
    let package = |name: &str, version: &str| Package {
        name: name.to_string(),
        version: version.to_string(),
        package_db: db.clone(),
        kind: PackageKind::Binary,
        repository_hint: REPOSITORY_HINT.to_string(),
    };

    let mut out = Vec::with_capacity(info.deps.len() + 2);
    out.push(package(&info.main.path, &info.main.version));
    out.push(package(STDLIB, &info.go_version));
    // Replacements are informational; records keep the required module.
    out.extend(info.deps.iter().map(|dep| package(&dep.path, &dep.version)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::golang::buildinfo::Module;

    fn module(path: &str, version: &str) -> Module {
        Module { path: path.into(), version: version.into(), ..Module::default() }
    }

    #[test]
    fn emits_main_stdlib_and_deps_in_order() {
        let info = BuildInfo {
            go_version: "go1.21".into(),
            main: module("example.com/app", "v1.2.0"),
            deps: vec![module("example.com/lib", "v0.3.0")],
            ..BuildInfo::default()
        };
        let pkgs = packages_for("usr/local/bin/app", &info);
        let pairs: Vec<(&str, &str)> =
            pkgs.iter().map(|p| (p.name.as_str(), p.version.as_str())).collect();
        assert_eq!(
            pairs,
            vec![("example.com/app", "v1.2.0"), ("stdlib", "go1.21"), ("example.com/lib", "v0.3.0")]
        );
        assert!(pkgs.iter().all(|p| p.package_db == "golang:usr/local/bin/app"));
        assert!(pkgs.iter().all(|p| p.kind == PackageKind::Binary && p.repository_hint == "Go"));
    }

    #[test]
    fn keeps_empty_versions_and_duplicate_deps() {
        let info = BuildInfo {
            go_version: "go1.22.1".into(),
            main: module("example.com/app", ""),
            deps: vec![module("example.com/lib", "v1"), module("example.com/lib", "v1")],
            ..BuildInfo::default()
        };
        let pkgs = packages_for("app", &info);
        assert_eq!(pkgs.len(), 4);
        assert_eq!(pkgs[0].version, "");
        assert_eq!(pkgs[2], pkgs[3]);
    }

    #[test]
    fn stdlib_is_emitted_without_dependencies() {
        let info = BuildInfo { go_version: "go1.20".into(), ..BuildInfo::default() };
        let pkgs = packages_for("bin/tool", &info);
        assert_eq!(pkgs.len(), 2);
        assert_eq!(pkgs[1].name, "stdlib");
        assert_eq!(pkgs[1].version, "go1.20");
    }

    #[test]
    fn replaced_dependencies_keep_their_required_version() {
        let mut dep = module("example.com/lib", "v1.0.0");
        dep.replace = Some(Box::new(module("example.com/fork", "v1.0.1")));
        let info =
            BuildInfo { go_version: "go1.21".into(), deps: vec![dep], ..BuildInfo::default() };
        let pkgs = packages_for("app", &info);
        assert_eq!(pkgs[2].name, "example.com/lib");
        assert_eq!(pkgs[2].version, "v1.0.0");
    }
}

//! Script bundle task.

use std::path::PathBuf;

use sitewright_bundle::{BundleConfig, Bundler, SyntaxTarget};

use crate::config::SiteConfig;
use crate::error::BuildError;
use crate::tasks::write_output;

/// Bundle the configured entry into the script output path.
pub fn run(config: &SiteConfig) -> Result<PathBuf, BuildError> {
    let bundle_config = BundleConfig {
        entry: config.js_dir().join(&config.js.entry),
        search_paths: config.module_paths(),
        base_dir: config.root.clone(),
    };

    let mut bundler = Bundler::new(bundle_config);
    if let Some(target) = config.js_target() {
        bundler = bundler.with_target(SyntaxTarget::new(target)?);
    }
    let bundle = bundler.bundle()?;

    let output = config.js_output();
    write_output(&output, &bundle.code)?;

    tracing::debug!(
        "Bundled {} modules into {}",
        bundle.modules.len(),
        output.display()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_single_bundle_with_reachable_modules() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());
        let js_dir = config.js_dir();
        fs::create_dir_all(js_dir.join("modules")).unwrap();
        fs::create_dir_all(js_dir.join("helpers")).unwrap();

        fs::write(
            js_dir.join("index.js"),
            "import menu from 'menu';\nmenu();\n",
        )
        .unwrap();
        fs::write(
            js_dir.join("modules/menu.js"),
            "import { qs } from 'dom';\nexport default function menu() { qs('.menu'); }\n",
        )
        .unwrap();
        fs::write(
            js_dir.join("helpers/dom.js"),
            "import menu from 'menu';\nexport const qs = (s) => document.querySelector(s);\n",
        )
        .unwrap();
        fs::write(js_dir.join("modules/unused.js"), "throw new Error('unused');\n").unwrap();

        let output = run(&config).unwrap();
        assert_eq!(output, temp.path().join("dist/assets/js/script.js"));

        let code = fs::read_to_string(&output).unwrap();
        assert!(code.contains("function menu()"));
        assert!(code.contains("document.querySelector"));
        assert!(!code.contains("unused"));
    }

    #[test]
    fn module_paths_move_with_the_source_dir() {
        let temp = tempdir().unwrap();
        let mut config = SiteConfig::with_root(temp.path());
        config.paths.source = PathBuf::from("site");
        let js_dir = config.js_dir();
        fs::create_dir_all(js_dir.join("modules")).unwrap();

        fs::write(js_dir.join("index.js"), "require('menu');\n").unwrap();
        fs::write(js_dir.join("modules/menu.js"), "module.exports = 'menu';\n").unwrap();

        let output = run(&config).unwrap();
        let code = fs::read_to_string(output).unwrap();
        assert!(code.contains("// site/_js/modules/menu.js"));
    }

    #[test]
    fn lowers_syntax_to_the_configured_target() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());
        fs::create_dir_all(config.js_dir()).unwrap();
        fs::write(
            config.js_dir().join("index.js"),
            "const area = (r) => r ** 2;\nwindow.size = window.width ?? area(2);\n",
        )
        .unwrap();

        let code = fs::read_to_string(run(&config).unwrap()).unwrap();
        assert!(code.contains("Math.pow"));
        assert!(!code.contains("??"));
        // Arrow functions are already es2015.
        assert!(code.contains("=>"));
    }

    #[test]
    fn unknown_target_is_an_error() {
        let temp = tempdir().unwrap();
        let mut config = SiteConfig::with_root(temp.path());
        config.js.target = "netscape4".to_string();
        fs::create_dir_all(config.js_dir()).unwrap();
        fs::write(config.js_dir().join("index.js"), "window.a = 1;\n").unwrap();

        let err = run(&config).unwrap_err();
        assert!(matches!(err, BuildError::Bundle(_)));
        assert!(!config.js_output().exists());
    }

    #[test]
    fn bundle_errors_do_not_write_output() {
        let temp = tempdir().unwrap();
        let config = SiteConfig::with_root(temp.path());
        fs::create_dir_all(config.js_dir()).unwrap();
        fs::write(config.js_dir().join("index.js"), "require('ghost');\n").unwrap();

        let err = run(&config).unwrap_err();
        assert!(matches!(err, BuildError::Bundle(_)));
        assert!(!config.js_output().exists());
    }
}

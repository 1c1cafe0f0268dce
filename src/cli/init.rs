//! Project initialization command

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Initialize a new project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub dir: String,
}

const CONFIG_FILE: &str = "sluice.toml";

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = Path::new(&self.dir);

        if project_dir.join(CONFIG_FILE).exists() {
            anyhow::bail!(
                "{} already exists in {}",
                CONFIG_FILE,
                project_dir.display()
            );
        }

        eprintln!("{} Initializing new project...\n", "→".blue());

        fs::create_dir_all(project_dir).context("Failed to create project directory")?;

        for (path, content) in self.scaffold() {
            let target = project_dir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&target, content)
                .with_context(|| format!("Failed to write {}", path))?;
            eprintln!("  {} Created {}", "✓".green(), path.cyan());
        }

        eprintln!(
            "\n{} Project initialized successfully!\n",
            "✓".green().bold()
        );

        eprintln!("  Next steps:");
        if self.dir != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.dir.cyan());
        }
        eprintln!("    {} npm install", "→".dimmed());
        eprintln!("    {} sluice", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn project_name(&self) -> String {
        Path::new(&self.dir)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| n != ".")
            .unwrap_or_else(|| "my-site".to_string())
    }

    /// Files written by `init`, relative to the project directory
    fn scaffold(&self) -> Vec<(&'static str, String)> {
        vec![
            (CONFIG_FILE, CONFIG_TEMPLATE.to_string()),
            ("package.json", self.package_json()),
            ("tailwind.config.js", TAILWIND_CONFIG.to_string()),
            ("src/index.html", page_html("Home", None)),
            ("src/about.html", page_html("About", Some("about"))),
            ("src/css/main.scss", MAIN_SCSS.to_string()),
            ("src/css/pages/about.scss", ABOUT_SCSS.to_string()),
            ("src/js/main.js", MAIN_JS.to_string()),
            ("src/js/pages/about.js", ABOUT_JS.to_string()),
            ("src/js/external/.gitkeep", String::new()),
            ("src/img/.gitkeep", String::new()),
        ]
    }

    fn package_json(&self) -> String {
        format!(
            r#"{{
  "name": "{}",
  "version": "0.1.0",
  "private": true,
  "scripts": {{
    "dev": "sluice dev",
    "build": "sluice build"
  }},
  "devDependencies": {{
    "tailwindcss": "^3.4.0"
  }}
}}
"#,
            self.project_name()
        )
    }
}

/// HTML page; `page` adds the page stylesheet and page script
fn page_html(title: &str, page: Option<&str>) -> String {
    let (style, script) = match page {
        Some(name) => (
            format!("\n    <link rel=\"stylesheet\" href=\"css/pages/{}.css\" />", name),
            format!("\n    <script src=\"js/pages/{}.js\"></script>", name),
        ),
        None => (String::new(), String::new()),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{title}</title>
    <link rel="stylesheet" href="css/style.css" />{style}
  </head>
  <body>
    <nav class="site-nav">
      <a href="index.html">Home</a>
      <a href="about.html">About</a>
    </nav>
    <main id="app">
      <h1 class="text-3xl font-bold">{title}</h1>
    </main>
    <script src="js/main.js"></script>{script}
  </body>
</html>
"#
    )
}

const CONFIG_TEMPLATE: &str = r#"# Sluice configuration

[paths.src]
base = "src"
css = "src/css"
js = "src/js"
img = "src/img"

[paths.dist]
base = "dist"

[paths.build]
base = "build"

[server]
port = 5000
open = false

[styles]
main = "main.scss"
output = "style.css"
tailwind_config = "tailwind.config.js"
browserslist = ["defaults"]

[scripts]
main = "main.js"
"#;

const TAILWIND_CONFIG: &str = r#"/** @type {import('tailwindcss').Config} */
module.exports = {
  content: ["./src/**/*.{html,js}"],
  theme: {
    extend: {},
  },
  plugins: [],
};
"#;

const MAIN_SCSS: &str = r#"@tailwind base;
@tailwind components;
@tailwind utilities;

$nav-gap: 1rem;

.site-nav {
  display: flex;
  gap: $nav-gap;

  a {
    text-decoration: none;
  }
}
"#;

const ABOUT_SCSS: &str = r#".about-card {
  padding: 2rem;
  border-radius: 8px;
}
"#;

const MAIN_JS: &str = r#"export function ready(callback) {
  if (document.readyState !== "loading") {
    callback();
  } else {
    document.addEventListener("DOMContentLoaded", callback);
  }
}

ready(function () {
  console.log("main loaded");
});
"#;

const ABOUT_JS: &str = r##"import { ready } from "../main.js";

ready(function () {
  document.querySelector("#app").classList.add("about-card");
});
"##;

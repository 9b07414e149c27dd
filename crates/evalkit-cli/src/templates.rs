//! The starter scaffold written by `evalkit init`, embedded at build time.

pub struct ScaffoldFile {
    /// Destination relative to the target directory.
    pub path: &'static str,
    pub content: &'static str,
}

pub const SCAFFOLD: &[ScaffoldFile] = &[
    ScaffoldFile {
        path: "promptfooconfig.yaml",
        content: include_str!("../scaffold/promptfooconfig.yaml"),
    },
    ScaffoldFile {
        path: "prompts/translation.txt",
        content: include_str!("../scaffold/prompts/translation.txt"),
    },
    ScaffoldFile {
        path: "prompts/summarize.txt",
        content: include_str!("../scaffold/prompts/summarize.txt"),
    },
    ScaffoldFile {
        path: "test-inputs/translation.yaml",
        content: include_str!("../scaffold/test-inputs/translation.yaml"),
    },
    ScaffoldFile {
        path: "test-inputs/summarize.yaml",
        content: include_str!("../scaffold/test-inputs/summarize.yaml"),
    },
    ScaffoldFile {
        path: "test-inputs/docs/release-notes.txt",
        content: include_str!("../scaffold/test-inputs/docs/release-notes.txt"),
    },
    ScaffoldFile {
        path: "evals/quality.yaml",
        content: include_str!("../scaffold/evals/quality.yaml"),
    },
    ScaffoldFile {
        path: "evals/cost.yaml",
        content: include_str!("../scaffold/evals/cost.yaml"),
    },
    ScaffoldFile {
        path: "README.md",
        content: include_str!("../scaffold/README.md"),
    },
    // Stored without the dot so it does not apply to this repository.
    ScaffoldFile {
        path: ".gitignore",
        content: include_str!("../scaffold/gitignore"),
    },
];

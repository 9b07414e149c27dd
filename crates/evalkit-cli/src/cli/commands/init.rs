use crate::cli::args::InitArgs;
use crate::cli::commands::exit_codes;
use crate::templates::SCAFFOLD;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Created,
    Overwritten,
    Skipped,
}

pub fn run(args: InitArgs) -> anyhow::Result<i32> {
    println!("🏗️  Writing evaluation scaffold to {}", args.dir.display());

    let mut skipped = 0;
    for file in SCAFFOLD {
        let path = args.dir.join(file.path);
        match write_file(&path, file.content, args.force)? {
            WriteOutcome::Created => println!("   Created {}", file.path),
            WriteOutcome::Overwritten => println!("   Overwrote {}", file.path),
            WriteOutcome::Skipped => {
                skipped += 1;
                println!("   Skipped {} (exists)", file.path);
            }
        }
    }

    if skipped > 0 {
        println!("   ℹ️  {} file(s) kept; pass --force to overwrite them.", skipped);
    }
    println!("✅  Scaffold ready. Run 'evalkit validate' to check it.");
    Ok(exit_codes::OK)
}

fn write_file(path: &Path, content: &str, force: bool) -> anyhow::Result<WriteOutcome> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("failed to create {}: {}", parent.display(), e))?;
    }
    let existed = path.exists();
    if existed && !force {
        return Ok(WriteOutcome::Skipped);
    }
    std::fs::write(path, content)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "wrote scaffold file");
    Ok(if existed {
        WriteOutcome::Overwritten
    } else {
        WriteOutcome::Created
    })
}

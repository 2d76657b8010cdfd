//! The `practica init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("practica.toml").exists() {
        println!("practica.toml already exists, skipping.");
    } else {
        std::fs::write("practica.toml", SAMPLE_CONFIG)?;
        println!("Created practica.toml");
    }

    std::fs::create_dir_all("banks")?;
    let sample_path = std::path::Path::new("banks/sample.toml");
    if sample_path.exists() {
        println!("banks/sample.toml already exists, skipping.");
    } else {
        std::fs::write(sample_path, SAMPLE_BANK)?;
        println!("Created banks/sample.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: practica validate --bank banks/sample.toml");
    println!("  2. Run: practica import --bank banks/sample.toml");
    println!("  3. Run: practica plan sample 4");
    println!("  4. Run: practica replay sample-2024 first");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# practica configuration

database = "./practica.db"

# In-progress sessions idle for longer than this read as abandoned.
staleness_minutes = 10080

# "strict" fails when the pool cannot cover the request; "best_effort"
# proceeds with what is available.
shortfall_policy = "strict"

[sampling]
policy = "prefer_unseen"
"#;

const SAMPLE_BANK: &str = r#"[[laws]]
id = "CE"
title = "Constitución Española"
articles = ["1", "2", "14", "23"]

[[laws]]
id = "LPAC"
title = "Ley del Procedimiento Administrativo Común"
articles = ["1", "21", "24"]

[[positions]]
id = "sample"
name = "Sample position"

[[positions.blocks]]
id = "general"
name = "General"

[[positions.blocks.topics]]
id = "constitution"
name = "The Constitution"
weight = 0.5
scopes = [{ law = "CE" }]

[[positions.blocks.topics]]
id = "procedure"
name = "Administrative procedure"
weight = 0.5
scopes = [{ law = "LPAC", articles = ["21", "24"] }]

[[questions]]
id = "ce-1"
law = "CE"
article = "1"
text = "Spain constitutes itself as a social and democratic State of..."
options = ["Law", "Right", "Autonomy", "Union"]
correct = "a"
explanation = "Article 1.1 CE."
review_status = "perfect"

[[questions]]
id = "ce-14"
law = "CE"
article = "14"
text = "Which article proclaims equality before the law?"
options = ["1", "9", "14", "23"]
correct = "c"
review_status = "perfect"

[[questions]]
id = "lpac-21"
law = "LPAC"
article = "21"
text = "Which article regulates the obligation to resolve?"
options = ["21", "24", "35", "40"]
correct = "a"
review_status = "perfect"

[[questions]]
id = "lpac-24"
law = "LPAC"
article = "24"
text = "Which article regulates administrative silence on requests?"
options = ["21", "22", "24", "25"]
correct = "c"
review_status = "perfect"

[[exams]]
id = "sample-2024"
position = "sample"
date = "2024-05-18"
title = "Sample exam 2024"

[[exams.parts]]
name = "first"
questions = ["ce-14", "lpac-21"]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use practica_core::parser::{parse_bank_str, validate_bank};
    use std::path::Path;

    #[test]
    fn sample_files_parse_cleanly() {
        practica_core::config::parse_config_str(SAMPLE_CONFIG).unwrap();
        let bank = parse_bank_str(SAMPLE_BANK, Path::new("sample.toml")).unwrap();
        assert!(validate_bank(&bank).is_empty());
        assert_eq!(bank.questions.len(), 4);
    }
}

//! The `adaptest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    std::fs::create_dir_all("item-banks")?;
    let example_path = std::path::Path::new("item-banks/example.toml");
    if example_path.exists() {
        println!("item-banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_ITEM_BANK)?;
        println!("Created item-banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: adaptest validate --item-bank item-banks/example.toml");
    println!("  2. Run: adaptest start --learner alice");
    println!("  3. Run: adaptest next --session <SESSION_ID>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

item_bank = "item-banks/example.toml"
output_dir = "./adaptest-results"

[cat]
min_items = 5
max_items = 10
target_sem = 0.3
tie_threshold = 0.95
recalibration_window = 20

[cat.category_targets]
spelling = 3
grammar = 3

[store]
type = "file"
path = "./adaptest-data/state.json"
"#;

const EXAMPLE_ITEM_BANK: &str = r#"[item_bank]
id = "example"
name = "Example Literacy Bank"
description = "A small bank to get started"

[[items]]
id = "spell-001"
category = "Spelling"
a = 1.1
b = -1.5
c = 0.2
prompt = "Which spelling is correct: 'recieve' or 'receive'?"

[[items]]
id = "spell-002"
category = "Spelling"
a = 1.3
b = -0.5
c = 0.2
prompt = "Which spelling is correct: 'seperate' or 'separate'?"

[[items]]
id = "spell-003"
category = "Spelling"
a = 1.0
b = 0.4
c = 0.2
prompt = "Which spelling is correct: 'accommodate' or 'acommodate'?"

[[items]]
id = "spell-004"
category = "Spelling"
a = 1.4
b = 1.3
c = 0.15
prompt = "Which spelling is correct: 'millennium' or 'millenium'?"

[[items]]
id = "gram-001"
category = "Grammar"
a = 0.9
b = -1.2
c = 0.25
prompt = "Choose the correct verb: 'She ___ to school every day.' (go / goes)"

[[items]]
id = "gram-002"
category = "Grammar"
a = 1.2
b = -0.2
c = 0.25
prompt = "Choose the correct pronoun: 'Between you and ___.' (I / me)"

[[items]]
id = "gram-003"
category = "Grammar"
a = 1.5
b = 0.8
c = 0.2
prompt = "Choose the correct form: 'If I ___ you, I would apologize.' (was / were)"

[[items]]
id = "gram-004"
category = "Grammar"
a = 1.1
b = 1.8
c = 0.2
prompt = "Choose the correct form: 'Neither the coach nor the players ___ ready.' (was / were)"

[[items]]
id = "vocab-001"
category = "Vocabulary"
a = 1.0
b = -0.8
c = 0.25
prompt = "What does 'brief' mean?"

[[items]]
id = "vocab-002"
category = "Vocabulary"
a = 1.2
b = 0.1
c = 0.25
prompt = "What does 'reluctant' mean?"

[[items]]
id = "vocab-003"
category = "Vocabulary"
a = 1.3
b = 1.0
c = 0.2
prompt = "What does 'ubiquitous' mean?"

[[items]]
id = "vocab-004"
category = "Vocabulary"
a = 0.8
b = 2.2
c = 0.2
prompt = "What does 'perspicacious' mean?"
"#;

use std::io::{self, IsTerminal, Read};

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "bilingual-reader",
    version,
    about = "Read a parallel text word by word with cached LLM translations"
)]
struct Cli {
    /// JSON token stream to read (defaults to stdin)
    #[arg(short = 't', long = "tokens")]
    tokens: Option<String>,

    /// Token index to act on
    #[arg(short = 'p', long = "position", default_value_t = 0, allow_negative_numbers = true)]
    position: i64,

    /// Side shown to the reader: source or target
    #[arg(short = 'D', long = "display")]
    display: Option<String>,

    /// Print the displayed sentence containing --position and exit
    #[arg(long = "sentence")]
    sentence: bool,

    /// Translate the word at --position and save it to the vocabulary
    #[arg(long = "save")]
    save: bool,

    /// List saved vocabulary for the language pair and exit
    #[arg(long = "show-vocabulary")]
    show_vocabulary: bool,

    /// List known language codes with their ids and exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Source language code (overrides settings)
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Target language code (overrides settings)
    #[arg(short = 'l', long = "target-lang")]
    target_lang: Option<String>,

    /// Model name for the OpenAI-compatible endpoint
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides OPENAI_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    bilingual_reader::logging::init(cli.verbose)?;

    let reads_stdin = cli.tokens.is_none() && !(cli.show_languages || cli.show_vocabulary);
    let input = if reads_stdin && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Some(buffer)
    } else {
        None
    };

    let output = bilingual_reader::run(
        bilingual_reader::Config {
            tokens_path: cli.tokens,
            position: cli.position,
            display: cli.display,
            sentence: cli.sentence,
            save: cli.save,
            show_vocabulary: cli.show_vocabulary,
            show_languages: cli.show_languages,
            source_lang: cli.source_lang,
            target_lang: cli.target_lang,
            model: cli.model,
            key: cli.key,
            settings_path: cli.read_settings,
        },
        input,
    )
    .await?;

    println!("{}", output);
    Ok(())
}

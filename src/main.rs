use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

use swagger_transcoder::parser::load_document;
use swagger_transcoder::schema::OriginKind;
use swagger_transcoder::{
    resolve, resolve_in_document, AddressScheme, DocumentFormat, FieldOrder, ForwardOptions, Generator,
    ReverseOptions, SwaggerParser,
};

/// Converts Swagger 2.0 documents to and from a hierarchical model schema
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a Swagger 2.0 document from a model file
    Forward {
        /// Model file (JSON) holding containers, definitions and model data
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the generated document
        #[arg(short, long, default_value = "./docs")]
        output: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = DocumentFormat::Yaml)]
        format: DocumentFormat,

        /// Keep inactive entries as commented blocks
        #[arg(long)]
        editable: bool,

        /// Validate the active document before writing it
        #[arg(long)]
        validate: bool,
    },

    /// Convert a Swagger 2.0 document into model entities
    Reverse {
        /// Swagger document (.json, .yaml or .yml)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the model entities; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Order of schema properties
        #[arg(long, value_enum, default_value_t = FieldOrder::Field)]
        field_order: FieldOrder,
    },

    /// Translate a reference into the other addressing scheme
    Resolve {
        /// Reference to translate, e.g. `#/definitions/Pet`
        reference: String,

        /// Target addressing scheme
        #[arg(long, value_enum, default_value_t = AddressScheme::Model)]
        to: AddressScheme,

        /// Swagger document used to locate the parameter bucket when resolving into the model scheme
        #[arg(short, long)]
        document: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = Env::default().filter_or("RUST_LOG", if cli.verbose { "debug" } else { "info" });
    env_logger::init_from_env(env);

    debug!("Starting swagger-transcoder...");

    match &cli.command {
        Commands::Forward { input, output, format, editable, validate } => {
            debug!("Model file: {:?}", input);
            debug!("Output directory: {:?}", output);

            let options = ForwardOptions {
                format: *format,
                editable: *editable,
                validate: *validate,
            };
            let generator = Generator::from_file(input, options)?;
            generator.write(output)?;

            info!("Swagger document generated successfully");
        }
        Commands::Reverse { input, output, field_order } => {
            let parser = SwaggerParser::new(ReverseOptions { field_order: *field_order });
            let result = parser
                .parse_file(input)
                .context(format!("Failed to convert document: {:?}", input))?;
            debug!("Produced {} entity packages", result.packages.len());

            let text = serde_json::to_string_pretty(&result)?;
            match output {
                Some(path) => {
                    fs::write(path, text).context(format!("Failed to write file: {:?}", path))?;
                    info!("Generated file: {:?}", path);
                }
                None => println!("{}", text),
            }
        }
        Commands::Resolve { reference, to, document } => {
            let resolved = match (document, to) {
                (Some(path), AddressScheme::Model) => {
                    let text = fs::read_to_string(path)
                        .context(format!("Failed to read document: {:?}", path))?;
                    let value = load_document(&text, DocumentFormat::from_path(path))
                        .context(format!("Failed to parse document: {:?}", path))?;
                    resolve_in_document(reference, &value)
                }
                _ => resolve(reference, OriginKind::classify(reference), *to),
            };
            println!("{}", resolved);
        }
    }

    Ok(())
}

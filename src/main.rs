use clap::{Arg, ArgAction, ArgMatches, Command};
use ilbody::listing::{parse_listing, ListingError, SimpleEncoder};
use ilbody::metadata::{MethodAttributes, MethodData, TypeData, TypeGraph, TypeGraphArenas};
use std::fs;

pub struct Settings {
    /// Path of the listing to read
    pub input: String,

    /// Full name of the type declaring the method (eg. `Acme.Program`)
    pub declaring_type: String,

    /// Name of the method the listing is the body of
    pub method_name: String,

    /// Static methods have no `this` parameter
    pub is_static: bool,

    /// Labels of instructions to remove after reading the listing, in order
    pub remove: Vec<String>,

    /// Also encode the body and dump the bytes
    pub encode: bool,
}

impl Settings {
    fn from_matches(matches: &ArgMatches) -> Settings {
        let string = |name: &str| {
            matches
                .get_one::<String>(name)
                .cloned()
                .unwrap_or_default()
        };
        Settings {
            input: string("INPUT"),
            declaring_type: string("type"),
            method_name: string("method"),
            is_static: matches.get_flag("static"),
            remove: matches
                .get_many::<String>("remove")
                .map(|labels| labels.cloned().collect())
                .unwrap_or_default(),
            encode: matches.get_flag("encode"),
        }
    }
}

fn main() -> Result<(), ListingError> {
    env_logger::init();

    let matches = Command::new("IL method body editor")
        .version(clap::crate_version!())
        .author(clap::crate_authors!())
        .about("Lays out a textual IL listing as an editable method body")
        .arg(
            Arg::new("type")
                .long("type")
                .value_name("TYPE_NAME")
                .default_value("Program")
                .help("Full name of the declaring type"),
        )
        .arg(
            Arg::new("method")
                .long("method")
                .value_name("METHOD_NAME")
                .default_value("Main")
                .help("Name of the method"),
        )
        .arg(
            Arg::new("static")
                .long("static")
                .action(ArgAction::SetTrue)
                .help("Treat the method as static (no `this` parameter)"),
        )
        .arg(
            Arg::new("remove")
                .long("remove")
                .value_name("LABEL")
                .action(ArgAction::Append)
                .help("Remove the instruction with this label (can be repeated)"),
        )
        .arg(
            Arg::new("encode")
                .long("encode")
                .action(ArgAction::SetTrue)
                .help("Encode the body and print the bytes"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the input IL listing to use")
                .required(true)
                .index(1),
        )
        .get_matches();
    let settings = Settings::from_matches(&matches);

    log::info!("Reading '{}'", &settings.input);
    let source = fs::read_to_string(&settings.input)?;

    let arenas = TypeGraphArenas::new();
    let graph = TypeGraph::new(&arenas);
    let core = graph.insert_core_types();
    let (namespace, name) = settings
        .declaring_type
        .rsplit_once('.')
        .unwrap_or(("", settings.declaring_type.as_str()));
    let declaring_type = graph.add_type(TypeData::new(namespace, name, Some(core.object)));
    let attributes = if settings.is_static {
        MethodAttributes::PUBLIC | MethodAttributes::STATIC
    } else {
        MethodAttributes::PUBLIC
    };
    let method = graph.add_method(MethodData::new(
        Some(declaring_type),
        &settings.method_name,
        attributes,
    ));

    let mut listing = parse_listing(&source, &graph, method)?;
    for label in &settings.remove {
        listing.remove(label)?;
    }
    print!("{}", listing);

    if settings.encode {
        let mut encoder = SimpleEncoder::new();
        listing.body.compute_header(&mut encoder)?;
        log::info!("Encoded {} bytes of code", listing.body.code_size());
        println!("// code       {}", hex(listing.body.method_code()));
        println!("// handlers   {}", hex(listing.body.exception_code()));
        println!("// locals     {}", hex(listing.body.local_vars_code()));
        println!("// signature  {}", hex(listing.body.method_signature()));
        for (index, string) in encoder.user_strings().iter().enumerate() {
            println!("// string {}   {:?}", index + 1, string);
        }
    }

    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    let bytes: Vec<String> = bytes.iter().map(|byte| format!("{:02x}", byte)).collect();
    bytes.join(" ")
}

use chrono::{DateTime, Utc};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::LevelFilter;
use runestone::content::{ListFilter, NewDocument};
use runestone::frontmatter::{Frontmatter, Value};
use runestone::markdown::Preview;
use runestone::path::slug_from_title;
use runestone::scan;
use runestone::schema::ContentType;
use runestone::site::Site;
use runestone::tag::DEFAULT_FIELD;
use runestone::{config::Config, content};
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

fn main() {
    let matches = app().get_matches();
    init_logger(verbosity(&matches));
    if let Err(err) = run(&matches) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn app() -> App<'static, 'static> {
    let field = Arg::with_name("field")
        .long("field")
        .takes_value(true)
        .default_value(DEFAULT_FIELD)
        .help("The list field to work on, e.g. `keywords`");
    let set = Arg::with_name("set")
        .long("set")
        .takes_value(true)
        .multiple(true)
        .number_of_values(1)
        .value_name("FIELD=VALUE")
        .help("Sets a frontmatter field; lists are comma-separated");
    let body = Arg::with_name("body")
        .long("body")
        .takes_value(true)
        .conflicts_with("body-file")
        .help("The Markdown body");
    let body_file = Arg::with_name("body-file")
        .long("body-file")
        .takes_value(true)
        .help("Reads the Markdown body from a file");
    let path = Arg::with_name("path")
        .required(true)
        .help("The document path relative to the content root");

    App::new("runestone")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("project")
                .long("project")
                .takes_value(true)
                .global(true)
                .help("The project directory (default: search upwards from here)"),
        )
        .arg(
            Arg::with_name("lang")
                .long("lang")
                .takes_value(true)
                .global(true)
                .help("The content language (default: the configured default)"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Logs more; repeat for more detail"),
        )
        .subcommand(
            SubCommand::with_name("content")
                .about("Reads and edits documents")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("list")
                        .about("Lists documents, newest first")
                        .arg(Arg::with_name("section").long("section").takes_value(true))
                        .arg(Arg::with_name("drafts").long("drafts").help("Only drafts")),
                )
                .subcommand(
                    SubCommand::with_name("get")
                        .about("Prints a document")
                        .arg(path.clone()),
                )
                .subcommand(
                    SubCommand::with_name("create")
                        .about("Creates a document")
                        .arg(Arg::with_name("section").required(true))
                        .arg(Arg::with_name("title").required(true))
                        .arg(
                            Arg::with_name("slug")
                                .long("slug")
                                .takes_value(true)
                                .help("Defaults to a slug of the title"),
                        )
                        .arg(Arg::with_name("category").long("category").takes_value(true))
                        .arg(set.clone())
                        .arg(body.clone())
                        .arg(body_file.clone())
                        .arg(
                            Arg::with_name("force")
                                .long("force")
                                .help("Creates the document even if it fails validation"),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("update")
                        .about("Merges fields into a document")
                        .arg(path.clone())
                        .arg(set)
                        .arg(
                            Arg::with_name("unset")
                                .long("unset")
                                .takes_value(true)
                                .multiple(true)
                                .number_of_values(1)
                                .value_name("FIELD"),
                        )
                        .arg(body)
                        .arg(body_file)
                        .arg(
                            Arg::with_name("expect-modified")
                                .long("expect-modified")
                                .takes_value(true)
                                .value_name("RFC3339")
                                .help("Fails if the document changed since this time"),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("delete")
                        .about("Deletes a document")
                        .arg(path.clone()),
                )
                .subcommand(
                    SubCommand::with_name("preview")
                        .about("Renders a document's body")
                        .arg(path),
                )
                .subcommand(
                    SubCommand::with_name("categories")
                        .about("Lists the categories of a section")
                        .arg(Arg::with_name("section").required(true)),
                ),
        )
        .subcommand(
            SubCommand::with_name("tags")
                .about("Lists and rewrites tags across all documents")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("list")
                        .about("Lists tags by usage")
                        .arg(field.clone())
                        .arg(Arg::with_name("names").long("names").help("Only the names")),
                )
                .subcommand(
                    SubCommand::with_name("rename")
                        .about("Renames a tag everywhere")
                        .arg(field.clone())
                        .arg(Arg::with_name("old").required(true))
                        .arg(Arg::with_name("new").required(true)),
                )
                .subcommand(
                    SubCommand::with_name("merge")
                        .about("Merges one tag into another")
                        .arg(field.clone())
                        .arg(Arg::with_name("source").required(true))
                        .arg(Arg::with_name("target").required(true)),
                )
                .subcommand(
                    SubCommand::with_name("delete")
                        .about("Removes a tag from every document")
                        .arg(field)
                        .arg(Arg::with_name("tag").required(true)),
                ),
        )
        .subcommand(SubCommand::with_name("sections").about("Lists sections"))
        .subcommand(
            SubCommand::with_name("translations")
                .about("Shows which languages translate a document")
                .arg(Arg::with_name("key").required(true)),
        )
        .subcommand(
            SubCommand::with_name("parity").about("Compares sections across languages"),
        )
        .subcommand(
            SubCommand::with_name("scan")
                .about("Checks naming, landing pages, fields, and translation coverage"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Runs the site generator and the search indexer")
                .arg(
                    Arg::with_name("no-index")
                        .long("no-index")
                        .help("Skips the search indexer"),
                ),
        )
        .subcommand(SubCommand::with_name("status").about("Shows uncommitted changes"))
        .subcommand(
            SubCommand::with_name("publish")
                .about("Commits and pushes all changes")
                .arg(
                    Arg::with_name("message")
                        .short("m")
                        .long("message")
                        .takes_value(true),
                ),
        )
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = match global(matches, "project") {
        Some(project) => Config::from_directory(&PathBuf::from(project))?,
        None => Config::from_directory(&std::env::current_dir()?)?,
    };
    let site = Site::new(config);
    let lang = global(matches, "lang");

    match matches.subcommand() {
        ("content", Some(content)) => run_content(&site, lang, content),
        ("tags", Some(tags)) => run_tags(&site, lang, tags),
        ("sections", Some(_)) => print(&site.repository(lang)?.sections()?),
        ("translations", Some(m)) => {
            print(&site.translation_status(m.value_of("key").unwrap_or_default())?)
        }
        ("parity", Some(_)) => print(&site.section_parity()?),
        ("scan", Some(_)) => print(&scan::scan(&site)?),
        ("build", Some(m)) => print(&site.builder().build(!m.is_present("no-index"))?),
        ("status", Some(_)) => print(&site.publisher().status()?),
        ("publish", Some(m)) => {
            let message = match m.value_of("message") {
                Some(message) => message.to_owned(),
                None => format!("Content update {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
            };
            print(&site.publisher().publish(&message)?)
        }
        _ => Ok(()),
    }
}

fn run_content(site: &Site, lang: Option<&str>, matches: &ArgMatches) -> Result<()> {
    let repository = site.repository(lang)?;
    match matches.subcommand() {
        ("list", Some(m)) => print(&repository.list(&ListFilter {
            section: m.value_of("section").map(str::to_owned),
            drafts_only: m.is_present("drafts"),
        })?),
        ("get", Some(m)) => print(&repository.get(required(m, "path"))?),
        ("create", Some(m)) => {
            let section = required(m, "section");
            let title = required(m, "title");
            let content_type = repository.content_types().for_section(section);
            let mut frontmatter = fields(content_type, m)?;
            frontmatter.insert("title", title);
            if !m.is_present("force") {
                let mut candidate = content_type.defaults(&content::today());
                candidate.merge(frontmatter.clone());
                let issues = content_type.validate(&candidate);
                if !issues.is_empty() {
                    let messages: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
                    return Err(format!("invalid document: {}", messages.join("; ")).into());
                }
            }
            let document = repository.create(NewDocument {
                section: section.to_owned(),
                category: m.value_of("category").map(str::to_owned),
                slug: match m.value_of("slug") {
                    Some(slug) => slug.to_owned(),
                    None => slug_from_title(title),
                },
                frontmatter,
                body: body(m)?.unwrap_or_default(),
            })?;
            print(&document)
        }
        ("update", Some(m)) => {
            let path = required(m, "path");
            let current = repository.get(path)?;
            let content_type = repository.content_types().for_section(&current.section);
            let mut patch = fields(content_type, m)?;
            for field in m.values_of("unset").into_iter().flatten() {
                patch.insert(field, "");
            }
            let new_body = body(m)?;
            let document = match m.value_of("expect-modified") {
                Some(expected) => {
                    let expected = DateTime::parse_from_rfc3339(expected)?.with_timezone(&Utc);
                    repository.update_if_unmodified(path, patch, new_body, expected)?
                }
                None => repository.update(path, patch, new_body)?,
            };
            print(&document)
        }
        ("delete", Some(m)) => print(&repository.delete(required(m, "path"))?),
        ("preview", Some(m)) => {
            let document = repository.get(required(m, "path"))?;
            print(&Preview::new(&document.body))
        }
        ("categories", Some(m)) => print(&repository.categories(required(m, "section"))?),
        _ => Ok(()),
    }
}

fn run_tags(site: &Site, lang: Option<&str>, matches: &ArgMatches) -> Result<()> {
    let (name, m) = match matches.subcommand() {
        (name, Some(m)) => (name, m),
        _ => return Ok(()),
    };
    let field = m.value_of("field").unwrap_or(DEFAULT_FIELD);
    match name {
        "list" => {
            let index = site.tag_index(lang, field)?;
            if m.is_present("names") {
                print(&index.names())
            } else {
                print(&index.entries())
            }
        }
        "rename" => print(
            &site
                .rewriter(lang, field)?
                .rename(required(m, "old"), required(m, "new"))?,
        ),
        "merge" => print(
            &site
                .rewriter(lang, field)?
                .merge(required(m, "source"), required(m, "target"))?,
        ),
        "delete" => print(&site.rewriter(lang, field)?.delete(required(m, "tag"))?),
        _ => Ok(()),
    }
}

// Collects `--set FIELD=VALUE` pairs, typed by the content type.
fn fields(content_type: &ContentType, matches: &ArgMatches) -> Result<Frontmatter> {
    let mut frontmatter = Frontmatter::new();
    for pair in matches.values_of("set").into_iter().flatten() {
        let (key, raw) = match pair.find('=') {
            Some(i) => (&pair[..i], &pair[i + 1..]),
            None => return Err(format!("expected FIELD=VALUE, found '{}'", pair).into()),
        };
        let value: Value = content_type
            .coerce(key.trim(), raw)
            .map_err(|message| format!("{}: {}", key.trim(), message))?;
        frontmatter.insert(key.trim(), value);
    }
    Ok(frontmatter)
}

fn body(matches: &ArgMatches) -> Result<Option<String>> {
    if let Some(body) = matches.value_of("body") {
        return Ok(Some(body.to_owned()));
    }
    match matches.value_of("body-file") {
        Some(path) => Ok(Some(fs::read_to_string(path)?)),
        None => Ok(None),
    }
}

// Clap enforces required arguments before we get here.
fn required<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.value_of(name).unwrap_or_default()
}

// Global arguments may be given at any level; the innermost value wins.
fn global<'a>(matches: &'a ArgMatches, name: &str) -> Option<&'a str> {
    let mut value = matches.value_of(name);
    let mut current = matches;
    while let (_, Some(sub)) = current.subcommand() {
        if let Some(inner) = sub.value_of(name) {
            value = Some(inner);
        }
        current = sub;
    }
    value
}

fn verbosity(matches: &ArgMatches) -> u64 {
    let mut count = matches.occurrences_of("verbose");
    let mut current = matches;
    while let (_, Some(sub)) = current.subcommand() {
        count = count.max(sub.occurrences_of("verbose"));
        current = sub;
    }
    count
}

fn init_logger(verbosity: u64) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbosity > 0 || std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        });
    }
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

extern crate clap;
extern crate env_logger;
extern crate lsup_store;

use std::process;

use clap::{App, Arg, ArgMatches, SubCommand};
use lsup_store::{Error, ErrorKind, Options, Store};

fn read_options(matches: &ArgMatches) -> Result<Options, Error> {
	let mut options = Options::default();
	if let Some(size) = matches.value_of("MAP_SIZE") {
		options.map_size = size.parse()?;
	}
	if let Some(seed) = matches.value_of("SEED") {
		options = options.with_seed_hex(seed)?;
	}
	Ok(options)
}

fn do_bootstrap(db: &str, force: bool, options: Options) -> Result<(), Error> {
	let store = Store::open(db, options)?;
	store.bootstrap(force)?;
	println!("store at {} initialized.", db);
	Ok(())
}

fn do_rebuild(db: &str, options: Options) -> Result<(), Error> {
	let store = Store::open(db, options)?;
	let quads = store.rebuild()?;
	println!("rebuilt permutation indexes from {} quads.", quads);
	Ok(())
}

fn do_stats(db: &str, options: Options) -> Result<(), Error> {
	let store = Store::open(db, options)?;
	store.with_read(|txn| {
		let stats = store.stats(txn)?;
		println!("terms:    {}", stats.terms);
		println!("quads:    {}", stats.quads);
		println!("triples:  {}", stats.triples);
		println!("contexts: {}", stats.contexts);
		Ok(())
	})
}

// 0 ok, 1 invalid arguments, 2 store inconsistent, 3 I/O or backend.
fn exit_code(err: &Error) -> i32 {
	match *err.kind() {
		ErrorKind::InvalidOptions(..) | ErrorKind::Num(..) => 1,
		ErrorKind::AlreadyInit(..)
			| ErrorKind::MissingTerm(..)
			| ErrorKind::Decode(..)
			| ErrorKind::Collision(..) => 2,
		_ => 3,
	}
}

fn db_arg<'a>(matches: &'a ArgMatches) -> &'a str {
	match matches.value_of("DB") {
		Some(db) => db,
		None => {
			eprintln!("missing required --db argument.");
			process::exit(1);
		},
	}
}

fn db_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
	vec![
		Arg::with_name("DB")
			.short("d")
			.long("db")
			.help("Store directory")
			.takes_value(true),
		Arg::with_name("MAP_SIZE")
			.long("map-size")
			.help("Maximum size of the memory map in bytes")
			.takes_value(true),
		Arg::with_name("SEED")
			.long("hash-seed-hex")
			.help("Term hash seed as 32 hex characters (advanced)")
			.takes_value(true),
	]
}

fn main() {
	env_logger::init();

	let matches =
		App::new("lsup-admin")
			.version("0.1.0")
			.about("Administration tool for the lsup triple store")
			.subcommand(SubCommand::with_name("bootstrap")
				.about("Initialize an empty store")
				.args(&db_args())
				.arg(Arg::with_name("FORCE")
					.short("f")
					.long("force")
					.help("Truncate an already initialized store first")))
			.subcommand(SubCommand::with_name("rebuild")
				.about("Rebuild the permutation indexes from the primary index")
				.args(&db_args()))
			.subcommand(SubCommand::with_name("stats")
				.about("Print store entry counts")
				.args(&db_args()))
			.get_matches();

	let result = match matches.subcommand() {
		("bootstrap", Some(sub_m)) => {
			let db = db_arg(&sub_m);
			read_options(&sub_m).and_then(|options| {
				do_bootstrap(db, sub_m.is_present("FORCE"), options)
			})
		},
		("rebuild", Some(sub_m)) => {
			let db = db_arg(&sub_m);
			read_options(&sub_m).and_then(|options| do_rebuild(db, options))
		},
		("stats", Some(sub_m)) => {
			let db = db_arg(&sub_m);
			read_options(&sub_m).and_then(|options| do_stats(db, options))
		},
		_ => {
			eprintln!("expected a subcommand: bootstrap, rebuild or stats.");
			process::exit(1);
		},
	};

	if let Err(err) = result {
		eprintln!("{}", err);
		process::exit(exit_code(&err));
	}
}

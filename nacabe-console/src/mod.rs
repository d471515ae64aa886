//! a nacabe console application.
//!
//! Offline counterpart of the attribute authority, producer and consumer:
//! creates authority keys, derives attribute keys and encrypts or decrypts
//! files with BSW CP-ABE.
extern crate deflate;
extern crate inflate;
extern crate nacabe;
extern crate rustc_hex as hex;
extern crate serde;
extern crate serde_cbor;

#[macro_use]
extern crate clap;

use std::{collections::BTreeSet, path::Path, process};
use clap::{App, Arg, ArgMatches, SubCommand};
use hex::{FromHex, ToHex};
use nacabe::{
    error::NacAbeError,
    keys::{setup, AttributeDecryptionKey, MasterSecret, PublicParameters},
    ndn::Name,
    schemes::bsw,
    utils::{
        file::{read_file, read_raw, read_to_vec, write_file, write_from_vec},
        policy::{pest::PolicyLanguage, Policy},
    },
};
use serde::{de::DeserializeOwned, Serialize};
use serde_cbor::{from_slice, ser::to_vec_packed};
use tracing::info;
use tracing_subscriber::EnvFilter;

// File extensions
const CT_EXTENSION: &str = "ct";
const KEY_EXTENSION: &str = "key";
const DOT: &str = ".";

// Object names
const ATTRIBUTES: &str = "a";
const POLICY: &str = "p";
const NAME: &str = "n";
const LANG: &str = "l";
const FILE: &str = "f";

// Default file names
const MSK_FILE: &str = "msk";
const PK_FILE: &str = "pk";
const SK_FILE: &str = "sk";

// Key file header and footer
const SK_BEGIN: &str = "-----BEGIN SK-----\n";
const SK_END: &str = "\n-----END SK-----";
const MSK_BEGIN: &str = "-----BEGIN MSK-----\n";
const MSK_END: &str = "\n-----END MSK-----";
const PK_BEGIN: &str = "-----BEGIN PK-----\n";
const PK_END: &str = "\n-----END PK-----";
const CT_BEGIN: &str = "-----BEGIN CT-----\n";
const CT_END: &str = "\n-----END CT-----";

// Application commands
const CMD_SETUP: &str = "setup";
const CMD_KEYGEN: &str = "keygen";
const CMD_ENCRYPT: &str = "encrypt";
const CMD_DECRYPT: &str = "decrypt";
const CMD_CHECK: &str = "check";

fn main() {
    arg_enum! {
        #[derive(Debug)]
        enum Lang {
            Human,
            Json,
        }
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    // Default file names
    let msk_default = [MSK_FILE, DOT, KEY_EXTENSION].concat();
    let pk_default = [PK_FILE, DOT, KEY_EXTENSION].concat();
    let sk_default = [SK_FILE, DOT, KEY_EXTENSION].concat();

    let abe_app = App::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::with_name(LANG)
                .long(LANG)
                .required(false)
                .takes_value(true)
                .possible_values(&Lang::variants())
                .case_insensitive(true)
                .help("policy language to use."),
        )
        .subcommand(
            // Setup
            SubCommand::with_name(CMD_SETUP)
                .about("sets up a new authority, creates the msk and pk.")
                .arg(
                    Arg::with_name(MSK_FILE)
                        .long(MSK_FILE)
                        .takes_value(true)
                        .default_value(&msk_default)
                        .help("master secret key file."),
                )
                .arg(
                    Arg::with_name(PK_FILE)
                        .long(PK_FILE)
                        .takes_value(true)
                        .default_value(&pk_default)
                        .help("public key file."),
                ),
        )
        .subcommand(
            // Keygen
            SubCommand::with_name(CMD_KEYGEN)
                .about("creates a user key sk bound to a set of attributes.")
                .arg(
                    Arg::with_name(PK_FILE)
                        .long(PK_FILE)
                        .takes_value(true)
                        .default_value(&pk_default)
                        .help("public key file."),
                )
                .arg(
                    Arg::with_name(MSK_FILE)
                        .long(MSK_FILE)
                        .takes_value(true)
                        .default_value(&msk_default)
                        .help("master secret key file."),
                )
                .arg(
                    Arg::with_name(SK_FILE)
                        .long(SK_FILE)
                        .takes_value(true)
                        .default_value(&sk_default)
                        .help("user key file."),
                )
                .arg(
                    Arg::with_name(NAME)
                        .long(NAME)
                        .takes_value(true)
                        .default_value("/console")
                        .help("name of the key holder."),
                )
                .arg(
                    Arg::with_name(ATTRIBUTES)
                        .required(true)
                        .takes_value(true)
                        .multiple(true)
                        .last(true)
                        .help("attributes to use."),
                ),
        )
        .subcommand(
            // Encrypt
            SubCommand::with_name(CMD_ENCRYPT)
                .about("encrypts a file using a policy.")
                .arg(
                    Arg::with_name(PK_FILE)
                        .long(PK_FILE)
                        .takes_value(true)
                        .default_value(&pk_default)
                        .help("public key file."),
                )
                .arg(
                    Arg::with_name(POLICY)
                        .long(POLICY)
                        .required(true)
                        .takes_value(true)
                        .help("policy to use."),
                )
                .arg(
                    Arg::with_name(FILE)
                        .long(FILE)
                        .required(true)
                        .takes_value(true)
                        .help("the file to encrypt."),
                ),
        )
        .subcommand(
            // Decrypt
            SubCommand::with_name(CMD_DECRYPT)
                .about("decrypts a file using a key.")
                .arg(
                    Arg::with_name(SK_FILE)
                        .long(SK_FILE)
                        .takes_value(true)
                        .default_value(&sk_default)
                        .help("user key file."),
                )
                .arg(
                    Arg::with_name(FILE)
                        .long(FILE)
                        .required(true)
                        .takes_value(true)
                        .help("the file to decrypt."),
                ),
        )
        .subcommand(
            // Check
            SubCommand::with_name(CMD_CHECK)
                .about("checks whether a set of attributes satisfies a policy.")
                .arg(
                    Arg::with_name(POLICY)
                        .long(POLICY)
                        .required(true)
                        .takes_value(true)
                        .help("policy to use."),
                )
                .arg(
                    Arg::with_name(ATTRIBUTES)
                        .takes_value(true)
                        .multiple(true)
                        .last(true)
                        .help("attributes to use."),
                ),
        )
        .get_matches();

    if let Err(e) = run(abe_app) {
        println!("Application Error: {}", e);
        process::exit(1);
    }

    fn run(argument_matches: ArgMatches) -> Result<(), NacAbeError> {
        let lang = match argument_matches.value_of(LANG) {
            Some(l) if l.eq_ignore_ascii_case("json") => PolicyLanguage::JsonPolicy,
            _ => PolicyLanguage::HumanPolicy,
        };
        match argument_matches.subcommand() {
            (CMD_SETUP, Some(arguments)) => run_setup(arguments),
            (CMD_KEYGEN, Some(arguments)) => run_keygen(arguments),
            (CMD_ENCRYPT, Some(arguments)) => run_encrypt(arguments, lang),
            (CMD_DECRYPT, Some(arguments)) => run_decrypt(arguments),
            (CMD_CHECK, Some(arguments)) => run_check(arguments, lang),
            _ => {
                println!("{}", argument_matches.usage());
                Ok(())
            }
        }
    }

    fn run_setup(arguments: &ArgMatches) -> Result<(), NacAbeError> {
        let (pk, msk) = setup();
        write_file(Path::new(file_arg(arguments, MSK_FILE)), ser_enc(&msk, MSK_BEGIN, MSK_END)?)?;
        write_file(Path::new(file_arg(arguments, PK_FILE)), ser_enc(&pk, PK_BEGIN, PK_END)?)?;
        info!("created a new authority");
        Ok(())
    }

    fn run_keygen(arguments: &ArgMatches) -> Result<(), NacAbeError> {
        let pk: PublicParameters = ser_dec(file_arg(arguments, PK_FILE))?;
        let msk: MasterSecret = ser_dec(file_arg(arguments, MSK_FILE))?;
        let subject: Name = arguments.value_of(NAME).unwrap_or("/console").parse()?;
        let attributes = attributes_arg(arguments);
        let sk = msk.derive_key(&pk, &subject, &attributes)?;
        write_file(Path::new(file_arg(arguments, SK_FILE)), ser_enc(&sk, SK_BEGIN, SK_END)?)
    }

    fn run_encrypt(arguments: &ArgMatches, lang: PolicyLanguage) -> Result<(), NacAbeError> {
        let pk: PublicParameters = ser_dec(file_arg(arguments, PK_FILE))?;
        let policy = arguments.value_of(POLICY).unwrap_or_default();
        let pt_file = arguments.value_of(FILE).unwrap_or_default();
        let ct_file = [pt_file, DOT, CT_EXTENSION].concat();
        let buffer = read_to_vec(Path::new(pt_file))?;
        let ct = bsw::encrypt(&pk.key, policy, lang, &buffer)?;
        write_file(Path::new(&ct_file), ser_enc(&ct, CT_BEGIN, CT_END)?)
    }

    fn run_decrypt(arguments: &ArgMatches) -> Result<(), NacAbeError> {
        let sk: AttributeDecryptionKey = ser_dec(file_arg(arguments, SK_FILE))?;
        let ct_file = arguments.value_of(FILE).unwrap_or_default();
        let ct: bsw::CpAbeCiphertext = ser_dec(ct_file)?;
        let pt_file = match ct_file.strip_suffix(&[DOT, CT_EXTENSION].concat()) {
            Some(stripped) => stripped.to_string(),
            None => [ct_file, DOT, "pt"].concat(),
        };
        let pt = bsw::decrypt(&sk.key, &ct)?;
        write_from_vec(Path::new(&pt_file), &pt)
    }

    fn run_check(arguments: &ArgMatches, lang: PolicyLanguage) -> Result<(), NacAbeError> {
        let policy = Policy::new(arguments.value_of(POLICY).unwrap_or_default(), lang)?;
        let attributes = attributes_arg(arguments);
        if policy.is_satisfied_by(&attributes) {
            println!("{:?} satisfies {}", attributes, policy);
        } else {
            println!("{:?} does not satisfy {}", attributes, policy);
        }
        Ok(())
    }

    fn file_arg<'a>(arguments: &'a ArgMatches, name: &str) -> &'a str {
        arguments.value_of(name).unwrap_or_default()
    }

    fn attributes_arg(arguments: &ArgMatches) -> BTreeSet<String> {
        match arguments.values_of(ATTRIBUTES) {
            None => BTreeSet::new(),
            Some(values) => values
                .flat_map(|value| value.split_whitespace())
                .map(|attribute| attribute.to_string())
                .collect(),
        }
    }
}

fn ser_enc<T: Serialize>(input: &T, head: &str, tail: &str) -> Result<String, NacAbeError> {
    use deflate::deflate_bytes;
    Ok([
        head.to_string(),
        deflate_bytes(&to_vec_packed(input)?).to_hex::<String>(),
        tail.to_string(),
    ]
    .concat())
}

fn ser_dec<T: DeserializeOwned>(file_name: &str) -> Result<T, NacAbeError> {
    Ok(from_slice(&ser_dec_bin(file_name)?)?)
}

fn ser_dec_bin(file_name: &str) -> Result<Vec<u8>, NacAbeError> {
    use inflate::inflate_bytes;
    let string = read_raw(&read_file(Path::new(file_name))?)?;
    match string.from_hex::<Vec<u8>>() {
        Ok(byte_slice) => inflate_bytes(&byte_slice)
            .map_err(|e| NacAbeError::encoding(&format!("inflate_bytes: {}", e))),
        Err(e) => Err(NacAbeError::encoding(&format!("read_raw: {}", e))),
    }
}

//! A simple DNS query client: resolves one record type against one server
//! and prints the answers.
use std::process::ExitCode;
use std::str::FromStr;

use clap::{App, Arg};
use log::debug;

use joinet::dns::{Client, Dns};
use joinet::ip_address::Family;
use joinet::IpAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryType {
    A,
    Aaaa,
    Ns,
    Mx,
    Soa,
    Ptr,
}

impl FromStr for QueryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A" => Ok(QueryType::A),
            "AAAA" => Ok(QueryType::Aaaa),
            "NS" => Ok(QueryType::Ns),
            "MX" => Ok(QueryType::Mx),
            "SOA" => Ok(QueryType::Soa),
            "PTR" => Ok(QueryType::Ptr),
            other => Err(format!("unsupported qtype: {}", other)),
        }
    }
}

struct CliOptions {
    qtype: QueryType,
    ns: String,
    domain: String,
    timeout_ms: u64,
}

impl CliOptions {
    fn parse() -> Self {
        let matches = App::new("resolve")
            .version("0.1")
            .about("A simple DNS query client, built on joinet::dns")
            .arg(
                Arg::new("qtype")
                    .short('q')
                    .long("qtype")
                    .required(true)
                    .long_help("Record type: A, AAAA, NS, MX, SOA, PTR")
                    .takes_value(true),
            )
            .arg(
                Arg::new("ns")
                    .short('n')
                    .long("ns")
                    .required(true)
                    .long_help("DNS server address to query")
                    .takes_value(true),
            )
            .arg(
                Arg::new("domain")
                    .short('d')
                    .long("domain")
                    .required(true)
                    .long_help("Domain (or, for PTR, dotted IP address) to query")
                    .takes_value(true),
            )
            .arg(
                Arg::new("timeout")
                    .short('t')
                    .long("timeout")
                    .required(false)
                    .long_help("Timeout in milliseconds")
                    .takes_value(true)
                    .default_value("3000"),
            )
            .get_matches();

        CliOptions {
            qtype: QueryType::from_str(matches.value_of("qtype").unwrap()).unwrap_or_else(|e| {
                eprintln!("{}", e);
                std::process::exit(2);
            }),
            ns: matches.value_of("ns").unwrap().to_string(),
            domain: matches.value_of("domain").unwrap().to_string(),
            timeout_ms: matches
                .value_of("timeout")
                .unwrap()
                .parse()
                .unwrap_or(3000),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let options = CliOptions::parse();
    debug!("resolving {:?} for {} via {}", options.qtype, options.domain, options.ns);

    let server = match IpAddress::parse(&options.ns, None) {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("invalid --ns address: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let client: Client<Dns> = Client::new();
    let result = match options.qtype {
        QueryType::A => client
            .resolve_host(&options.domain, Family::V4, &server, options.timeout_ms)
            .map(|addrs| addrs.iter().map(|a| a.to_text()).collect::<Vec<_>>()),
        QueryType::Aaaa => client
            .resolve_host(&options.domain, Family::V6, &server, options.timeout_ms)
            .map(|addrs| addrs.iter().map(|a| a.to_text()).collect::<Vec<_>>()),
        QueryType::Ns => client.resolve_name_server(&options.domain, &server, options.timeout_ms),
        QueryType::Mx => client
            .resolve_mail_exchanger(&options.domain, &server, options.timeout_ms)
            .map(|rrs| rrs.iter().map(|(pref, host)| format!("{} {}", pref, host)).collect()),
        QueryType::Soa => client
            .resolve_authority(&options.domain, &server, options.timeout_ms)
            .map(|mname| mname.into_iter().collect()),
        QueryType::Ptr => match IpAddress::parse(&options.domain, None) {
            Ok(addr) => client.resolve_address(&addr, &server, options.timeout_ms),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(answers) if answers.is_empty() => {
            eprintln!("no answers");
            ExitCode::FAILURE
        }
        Ok(answers) => {
            for answer in answers {
                println!("{}", answer);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("query failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

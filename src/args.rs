use clap::Parser;
use reqwest::Url;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(
        short,
        long,
        help = "Config file. Values from it and from the environment override the flags below."
    )]
    pub config: Option<String>,

    #[arg(short, long, default_value = "127.0.0.1")]
    pub bind: String,

    #[arg(short, long, default_value = "8124")]
    pub port: u16,

    #[arg(long, default_value = "2000", help = "Lifetime of every cache entry, in milliseconds.")]
    pub ttl_ms: u32,

    #[arg(long, default_value = "1000", help = "Interval of the expired entry sweep, in milliseconds.")]
    pub sweep_interval_ms: u32,

    #[arg(
        short,
        long = "endpoint",
        value_parser = endpoint_parser,
        help = "Upstream node of a chain, as <chain_id>=<url>. Repeatable."
    )]
    pub endpoints: Vec<(u64, Url)>,
}

fn endpoint_parser(s: &str) -> Result<(u64, Url), String> {
    let (chain_id, url) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid endpoint format: {s}"))?;

    let chain_id = chain_id
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("Invalid chain id `{chain_id}`: {e}"))?;
    let url = Url::from_str(url).map_err(|e| e.to_string())?;

    Ok((chain_id, url))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_endpoint_parser() {
        let (chain_id, url) = endpoint_parser("137=https://polygon.example/rpc?key=abc").unwrap();
        assert_eq!(chain_id, 137);
        assert_eq!(url.as_str(), "https://polygon.example/rpc?key=abc");

        assert!(endpoint_parser("https://no-chain-id.example").is_err());
        assert!(endpoint_parser("mainnet=https://node.example").is_err());
        assert!(endpoint_parser("1=not a url").is_err());
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["chain-rpc-cache", "-e", "1=http://localhost:8545"]);
        assert_eq!(args.port, 8124);
        assert_eq!(args.ttl_ms, 2000);
        assert_eq!(args.endpoints.len(), 1);
        assert!(args.config.is_none());
    }
}

//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "reflash")]
#[command(author, version, about = "ECU program flash reflash tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to extra chip profiles (a .ron file or a directory of them)
    #[arg(long, global = true)]
    pub profile_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target selection shared by the commands that touch flash
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Chip profile name
    #[arg(short, long, default_value = "SH7051")]
    pub chip: String,

    /// Raw ROM image backing the simulated controller; created erased if
    /// missing, saved back after erase and write
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Program pulses each bit needs before it reads 0
    #[arg(long, default_value_t = 1)]
    pub program_pulses: u32,

    /// Vary the pulses needed per bit between 1 and --program-pulses
    #[arg(long)]
    pub varied: bool,

    /// Erase pulses each block needs
    #[arg(long, default_value_t = 1)]
    pub erase_pulses: u32,

    /// Simulate a deasserted flash write-enable pin
    #[arg(long)]
    pub write_protected: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Erase flash blocks
    Erase {
        #[command(flatten)]
        target: TargetArgs,

        /// Block index to erase
        #[arg(short, long, conflicts_with = "all", required_unless_present = "all")]
        block: Option<usize>,

        /// Erase every block
        #[arg(long)]
        all: bool,
    },

    /// Program a file into flash
    Write {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x8000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Erase the blocks the file covers first
        #[arg(long)]
        erase: bool,
    },

    /// Verify flash contents against file
    Verify {
        #[command(flatten)]
        target: TargetArgs,

        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x8000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,
    },

    /// Show chip profile details
    Info {
        /// Chip profile name
        #[arg(short, long, default_value = "SH7051")]
        chip: String,
    },

    /// List known chip profiles
    ListChips,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x8000"), Ok(0x8000));
        assert_eq!(parse_hex_u32("0X1f"), Ok(0x1F));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("").is_err());
    }

    #[test]
    fn test_erase_needs_block_or_all() {
        assert!(Cli::try_parse_from(["reflash", "erase"]).is_err());
        assert!(Cli::try_parse_from(["reflash", "erase", "--block", "1", "--all"]).is_err());
        let cli = Cli::try_parse_from(["reflash", "erase", "--all", "--chip", "sh7055"]).unwrap();
        match cli.command {
            Commands::Erase { target, block, all } => {
                assert_eq!(target.chip, "sh7055");
                assert_eq!(block, None);
                assert!(all);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_write_args() {
        let cli = Cli::try_parse_from([
            "reflash", "-vv", "write", "-i", "rom.bin", "-a", "0x20000", "--erase",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Write {
                input, addr, erase, ..
            } => {
                assert_eq!(input, PathBuf::from("rom.bin"));
                assert_eq!(addr, 0x20000);
                assert!(erase);
            }
            _ => panic!("wrong command"),
        }
    }
}

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("oscwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: oscwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("OSCWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("OSCWIRE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "features: session={}, device={}, async={}, cli=true",
        cfg!(feature = "session"),
        cfg!(feature = "device"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}

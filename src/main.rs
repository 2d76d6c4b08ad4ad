mod cli;

use anyhow::Context;
use cli::{Args, Command};
use tracing::{info, Level};
use wirecodec::dns::{build_request, parse_response};
use wirecodec::icmp::{build_echo_request, parse_captured_packet};
use wirecodec::rc4;
use wirecodec::socks5::{parse_destination, Socks5Parse};

fn main() -> anyhow::Result<()> {
    let args = Args::parse_args();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::DnsQuery {
            hostname,
            qtype,
            id,
        } => {
            let request = build_request(hostname.as_bytes(), qtype, id)
                .with_context(|| format!("Failed to build query for '{}'", hostname))?;
            info!("Built {:?} query for {} ({} bytes)", qtype, hostname, request.len());
            println!("{}", hex::encode(&request));
        }
        Command::DnsResponse { message } => {
            let response = parse_response(&message.0).context("Failed to decode DNS response")?;
            let header = &response.header;
            println!(
                "id={} qr={} opcode={} aa={} tc={} rd={} ra={} rcode={}",
                header.id,
                header.qr,
                header.opcode,
                header.aa,
                header.tc,
                header.rd,
                header.ra,
                header.rcode
            );
            println!(
                "question: {} type {}",
                String::from_utf8_lossy(&response.query_domain),
                response.query_type
            );
            for record in &response.records {
                println!("{}", record);
            }
        }
        Command::Socks5 { buffer } => {
            match parse_destination(&buffer.0).context("Failed to decode SOCKS5 header")? {
                Socks5Parse::Complete {
                    header,
                    bytes_consumed,
                } => {
                    println!("{:?} {} ({} bytes)", header.atyp, header, bytes_consumed);
                }
                Socks5Parse::Incomplete { bytes_needed } => {
                    println!("incomplete: {} more bytes needed", bytes_needed);
                }
            }
        }
        Command::Ping { payload, id, seq } => {
            let packet = build_echo_request(payload.as_bytes(), id, seq);
            println!("{}", hex::encode(&packet));
        }
        Command::PingParse { packet } => {
            let frame = parse_captured_packet(&packet.0).context("Failed to decode ICMP packet")?;
            println!(
                "{} -> {} ttl={} type={} code={} checksum={:#06x} id={} seq={} data={}",
                frame.src_ip(),
                frame.dst_ip(),
                frame.ip_ttl,
                frame.icmp_type,
                frame.code,
                frame.checksum,
                frame.id,
                frame.seq,
                hex::encode(&frame.data)
            );
        }
        Command::Rc4 { data, key } => {
            let output = rc4::apply(&data.0, key.as_bytes()).context("RC4 failed")?;
            println!("{}", hex::encode(&output));
        }
    }

    Ok(())
}

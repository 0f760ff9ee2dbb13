use lettre::message::Mailbox;

#[derive(Debug, thiserror::Error)]
#[error("could not parse address '{address}': {reason}")]
pub struct AddressError {
    pub address: String,
    pub reason: String,
}

/// Parse an RFC 5322 mailbox (`Name <addr>` or a bare `addr`).
pub fn parse_mailbox(address: &str) -> Result<Mailbox, AddressError> {
    address.trim().parse::<Mailbox>().map_err(|e| AddressError {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Normalize a mailbox string. A display name is always quoted:
/// `Jane Doe <jane@example.com>` becomes `"Jane Doe" <jane@example.com>`,
/// a bare address is returned as-is.
pub fn format_address(address: &str) -> Result<String, AddressError> {
    let mailbox = parse_mailbox(address)?;
    Ok(render_mailbox(&mailbox))
}

fn render_mailbox(mailbox: &Mailbox) -> String {
    match mailbox.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\" <{}>", escaped, mailbox.email)
        }
        _ => mailbox.email.to_string(),
    }
}

/// Sender used when a target has no `from`: `dispatch@<hostname>`.
pub fn default_sender() -> String {
    sender_for_host(hostname().as_deref())
}

/// `dispatch@localhost` unless `host` makes a parseable mailbox.
pub fn sender_for_host(host: Option<&str>) -> String {
    host.map(|h| format!("dispatch@{}", h))
        .filter(|sender| parse_mailbox(sender).is_ok())
        .unwrap_or_else(|| "dispatch@localhost".to_string())
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().filter(|h| !h.is_empty())
}

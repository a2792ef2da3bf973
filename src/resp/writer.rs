//! RESP command serializer.
//!
//! Encodes command arguments into the RESP bulk string array wire format:
//! `*<N>\r\n$<len>\r\narg1\r\n$<len>\r\narg2\r\n…`

use itoa::Buffer;

/// Encode a single command into RESP wire format.
///
/// Each argument is treated as a binary-safe bulk string.
pub fn encode_command<S: AsRef<[u8]>>(args: &[S]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(args));
    write_command(&mut buf, &mut Buffer::new(), args);
    buf
}

/// Encode several commands into one contiguous buffer so a whole batch goes
/// out in a single `write_all`.
pub fn encode_pipeline<S: AsRef<[u8]>>(commands: &[Vec<S>]) -> Vec<u8> {
    let cap = commands.iter().map(|c| encoded_len(c)).sum();
    let mut buf = Vec::with_capacity(cap);
    let mut itoa_buf = Buffer::new();
    for cmd in commands {
        write_command(&mut buf, &mut itoa_buf, cmd);
    }
    buf
}

/// Encode `MULTI`, the queued commands and `EXEC` as one buffer.
pub fn encode_transaction<S: AsRef<[u8]>>(commands: &[Vec<S>]) -> Vec<u8> {
    let cap = commands.iter().map(|c| encoded_len(c)).sum::<usize>() + 2 * 16;
    let mut buf = Vec::with_capacity(cap);
    let mut itoa_buf = Buffer::new();
    write_command(&mut buf, &mut itoa_buf, &["MULTI"]);
    for cmd in commands {
        write_command(&mut buf, &mut itoa_buf, cmd);
    }
    write_command(&mut buf, &mut itoa_buf, &["EXEC"]);
    buf
}

fn encoded_len<S: AsRef<[u8]>>(args: &[S]) -> usize {
    // '*' + digits + \r\n, then '$' + digits + \r\n + data + \r\n per arg
    let mut cap = 1 + 10 + 2;
    for arg in args {
        cap += 1 + 10 + 2 + arg.as_ref().len() + 2;
    }
    cap
}

fn write_command<S: AsRef<[u8]>>(buf: &mut Vec<u8>, itoa_buf: &mut Buffer, args: &[S]) {
    buf.push(b'*');
    buf.extend_from_slice(itoa_buf.format(args.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    for arg in args {
        let arg = arg.as_ref();
        buf.push(b'$');
        buf.extend_from_slice(itoa_buf.format(arg.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
}

// ── Tests ──────────────────────────────────────────────────────────

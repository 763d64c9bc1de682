//! Optional human-typable alternative to KISS: a one-letter command per
//! line, in the spirit of the reference firmware's `SimpleSerial.c`. (§6)
//!
//! Only command *dispatch* is implemented here — parsing a line into a
//! [`Command`]. Location-beacon formatting, message-retry/auto-ACK and
//! persisted-settings I/O (the bulk of `SimpleSerial.c`) stay out of scope;
//! callers that want those behaviors build them on top of the events this
//! module recognises.

/// One recognised textual command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// `!<payload>` — send `payload` as a UI frame's info field.
    SendPacket(&'a [u8]),
    /// `c<callsign>` — set the source callsign used for subsequent sends.
    SetCallsign(&'a [u8]),
    /// `d<callsign>` — set the destination callsign.
    SetDestination(&'a [u8]),
    /// `H` — print current settings.
    PrintSettings,
    /// `S` — persist current settings.
    SaveSettings,
    /// `C` — clear persisted settings.
    ClearSettings,
    /// `L` — (re)load persisted settings.
    LoadSettings,
    /// `h` — print command help.
    Help,
    /// Recognised first byte, but the line didn't meet the command's length requirement.
    Malformed,
    /// First byte isn't a recognised command letter.
    Unknown,
}

/// Parse one line (without its trailing newline) of textual-protocol input.
pub fn parse_line(line: &[u8]) -> Command<'_> {
    let Some(&first) = line.first() else {
        return Command::Unknown;
    };
    let rest = &line[1..];
    match first {
        b'!' if !rest.is_empty() => Command::SendPacket(rest),
        b'!' => Command::Malformed,
        b'c' if !rest.is_empty() => Command::SetCallsign(rest),
        b'c' => Command::Malformed,
        b'd' if !rest.is_empty() => Command::SetDestination(rest),
        b'd' => Command::Malformed,
        b'H' => Command::PrintSettings,
        b'S' => Command::SaveSettings,
        b'C' => Command::ClearSettings,
        b'L' => Command::LoadSettings,
        b'h' => Command::Help,
        _ => Command::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_packet_strips_leading_bang() {
        assert_eq!(parse_line(b"!hello"), Command::SendPacket(b"hello"));
    }

    #[test]
    fn bare_bang_is_malformed() {
        assert_eq!(parse_line(b"!"), Command::Malformed);
    }

    #[test]
    fn single_letter_commands_dispatch() {
        assert_eq!(parse_line(b"H"), Command::PrintSettings);
        assert_eq!(parse_line(b"S"), Command::SaveSettings);
        assert_eq!(parse_line(b"C"), Command::ClearSettings);
        assert_eq!(parse_line(b"L"), Command::LoadSettings);
        assert_eq!(parse_line(b"h"), Command::Help);
    }

    #[test]
    fn set_callsign_and_destination() {
        assert_eq!(parse_line(b"cMYCALL"), Command::SetCallsign(b"MYCALL"));
        assert_eq!(parse_line(b"dDEST"), Command::SetDestination(b"DEST"));
    }

    #[test]
    fn empty_line_is_unknown() {
        assert_eq!(parse_line(b""), Command::Unknown);
    }

    #[test]
    fn unrecognised_letter_is_unknown() {
        assert_eq!(parse_line(b"zgarbage"), Command::Unknown);
    }
}

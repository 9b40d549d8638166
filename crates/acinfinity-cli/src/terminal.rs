//! Line-oriented selection prompt for pairing sessions

use std::io::Write;

use tokio::io::{AsyncBufRead, Lines};

use acinfinity_core::{
    AdvertisementSource, Candidate, DeviceTransport, PairingSession, RegistrationStore,
    SessionErrorCode, StepOutcome,
};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Choice Parsing
// ----------------------------------------------------------------------------

/// What the operator asked for at the selection prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Zero-based index into the presented candidates
    Select(usize),
    Rescan,
    Quit,
}

/// Parse one line of operator input
///
/// Candidates are numbered from 1. A single candidate can also be accepted
/// with `y`.
pub fn parse_choice(line: &str, candidate_count: usize, allow_rescan: bool) -> Result<Choice> {
    let input = line.trim().to_ascii_lowercase();
    match input.as_str() {
        "q" | "quit" | "n" | "no" => Ok(Choice::Quit),
        "r" | "rescan" if allow_rescan => Ok(Choice::Rescan),
        "y" | "yes" if candidate_count == 1 => Ok(Choice::Select(0)),
        other => {
            let number: usize = other
                .parse()
                .map_err(|_| CliError::InvalidSelection(format!("'{}'", line.trim())))?;
            if number == 0 || number > candidate_count {
                return Err(CliError::InvalidSelection(format!(
                    "{} is not between 1 and {}",
                    number, candidate_count
                )));
            }
            Ok(Choice::Select(number - 1))
        }
    }
}

fn error_message(error: SessionErrorCode) -> &'static str {
    match error {
        SessionErrorCode::CannotConnect => "Failed to connect to the device, try again",
        SessionErrorCode::Unknown => "Unexpected error while verifying the device",
    }
}

fn print_candidates(title: Option<&str>, candidates: &[Candidate], error: Option<SessionErrorCode>) {
    if let Some(title) = title {
        println!("Discovered {}", title);
    }
    if let Some(error) = error {
        println!("! {} ({})", error_message(error), error);
    }
    for (index, candidate) in candidates.iter().enumerate() {
        println!("  {}. {}", index + 1, candidate.label);
    }
}

// ----------------------------------------------------------------------------
// Selection Loop
// ----------------------------------------------------------------------------

/// Present candidates and feed the operator's choices to the session until it
/// reaches a terminal outcome
///
/// End of input is treated as a request to quit.
pub async fn drive_selection<S, T, R, I>(
    session: &mut PairingSession<S, T, R>,
    mut outcome: StepOutcome,
    input: &mut Lines<I>,
    allow_rescan: bool,
) -> Result<StepOutcome>
where
    S: AdvertisementSource,
    T: DeviceTransport<Handle = S::Handle>,
    R: RegistrationStore,
    I: AsyncBufRead + Unpin,
{
    loop {
        let (candidates, error) = match outcome {
            StepOutcome::ShowCandidates { candidates, error } => (candidates, error),
            terminal => return Ok(terminal),
        };
        print_candidates(session.title_name(), &candidates, error);

        let choice = loop {
            if allow_rescan {
                print!("Select [1-{}], r to rescan, q to quit: ", candidates.len());
            } else {
                print!("Select [1-{}] or q to quit: ", candidates.len());
            }
            std::io::stdout().flush()?;

            let Some(line) = input.next_line().await? else {
                break Choice::Quit;
            };
            match parse_choice(&line, candidates.len(), allow_rescan) {
                Ok(choice) => break choice,
                Err(e) => println!("{}", e),
            }
        };

        outcome = match choice {
            Choice::Select(index) => {
                let candidate = &candidates[index];
                println!("Verifying {}...", candidate.label);
                session.select(&candidate.address).await?
            }
            Choice::Rescan => session.rescan().await?,
            Choice::Quit => session.abort()?,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use acinfinity_core::{
        encode, AbortReason, AdvertisementSighting, DeviceAddress, DeviceModel,
        MemoryRegistrationStore, ModelInfo, PairingConfig, PairingState, ProbeError, ScanError,
        SessionEntry, TransportErrorKind, MANUFACTURER_ID,
    };
    use async_trait::async_trait;
    use tokio::io::AsyncBufReadExt;

    fn sighting(address: &str, model: DeviceModel) -> AdvertisementSighting<DeviceAddress> {
        let address = DeviceAddress::new(address);
        AdvertisementSighting::new(address.clone(), address)
            .with_manufacturer_data(MANUFACTURER_ID, encode(&ModelInfo { version: 1, model }))
    }

    struct StaticScanner(Vec<AdvertisementSighting<DeviceAddress>>);

    #[async_trait]
    impl AdvertisementSource for StaticScanner {
        type Handle = DeviceAddress;

        async fn discovered(&self) -> std::result::Result<Vec<AdvertisementSighting<DeviceAddress>>, ScanError> {
            Ok(self.0.clone())
        }
    }

    /// Fails the first `failures` opens, then succeeds
    struct FlakyTransport {
        failures: AtomicUsize,
    }

    #[async_trait]
    impl DeviceTransport for FlakyTransport {
        type Handle = DeviceAddress;
        type Connection = ();

        async fn open(&self, _handle: &DeviceAddress) -> std::result::Result<(), ProbeError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(TransportErrorKind::Refused.into());
            }
            Ok(())
        }

        async fn refresh(&self, _connection: &mut ()) -> std::result::Result<Vec<u8>, ProbeError> {
            Ok(encode(&ModelInfo {
                version: 1,
                model: DeviceModel::Controller69Pro,
            }))
        }

        async fn close(&self, _connection: ()) {}
    }

    fn session(
        failures: usize,
    ) -> PairingSession<StaticScanner, FlakyTransport, MemoryRegistrationStore> {
        PairingSession::new(
            PairingConfig::default(),
            Arc::new(StaticScanner(vec![
                sighting("AA:00:00:00:00:01", DeviceModel::Controller67),
                sighting("AA:00:00:00:00:02", DeviceModel::Controller69Pro),
            ])),
            Arc::new(FlakyTransport {
                failures: AtomicUsize::new(failures),
            }),
            Arc::new(MemoryRegistrationStore::new()),
        )
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_choice("2\n", 3, true).unwrap(), Choice::Select(1));
        assert!(parse_choice("0", 3, true).is_err());
        assert!(parse_choice("4", 3, true).is_err());
        assert!(parse_choice("two", 3, true).is_err());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_choice("Q", 3, true).unwrap(), Choice::Quit);
        assert_eq!(parse_choice("r", 3, true).unwrap(), Choice::Rescan);
        assert!(parse_choice("r", 3, false).is_err());
        assert_eq!(parse_choice("y", 1, false).unwrap(), Choice::Select(0));
        assert!(parse_choice("y", 2, false).is_err());
    }

    #[tokio::test]
    async fn test_retry_after_failed_verification() {
        let mut session = session(1);
        let first = session.start(SessionEntry::Manual).await.unwrap();
        let mut input = b"x\n2\n2\n".as_slice().lines();

        let outcome = drive_selection(&mut session, first, &mut input, true)
            .await
            .unwrap();

        match outcome {
            StepOutcome::Completed(record) => {
                assert_eq!(record.address, DeviceAddress::new("AA:00:00:00:00:02"));
                assert_eq!(record.display_name, "UIS Controller 69 Pro");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(session.state(), PairingState::Done);
    }

    #[tokio::test]
    async fn test_end_of_input_cancels() {
        let mut session = session(0);
        let first = session.start(SessionEntry::Manual).await.unwrap();
        let mut input = b"".as_slice().lines();

        let outcome = drive_selection(&mut session, first, &mut input, true)
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Aborted(AbortReason::Cancelled));
    }
}

//! Push: reference commands, pack ingestion and per-reference updates.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use bucketgit_core::reference::validate_ref_name;
use bucketgit_core::{Error, Hash, ObjectKind, Reference, Result, hash, object::parse_commit};
use bucketgit_storage::GitStorage;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::pack::read_pack;
use crate::pktline::{Band, PktReader, PktWriter, SideBand};

/// Ancestry checks for `receive.denyNonFastForwards` give up after this many commits.
const MAX_ANCESTRY_WALK: usize = 100_000;

/// One `<old> <new> <ref>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCommand {
    pub old: Hash,
    pub new: Hash,
    pub name: String,
}

impl RefCommand {
    pub fn is_create(&self) -> bool {
        self.old.is_null()
    }

    pub fn is_delete(&self) -> bool {
        self.new.is_null()
    }

    fn parse(line: &str) -> Result<Self> {
        let mut parts = line.splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(old), Some(new), Some(name)) if !name.is_empty() => Ok(Self {
                old: hash::parse_hex(old)?,
                new: hash::parse_hex(new)?,
                name: name.to_string(),
            }),
            _ => Err(Error::malformed("push command", format!("'{line}'"))),
        }
    }
}

/// Decoded push request: commands, client capabilities and the raw pack.
#[derive(Debug, Clone)]
pub struct PushRequest<'a> {
    pub commands: Vec<RefCommand>,
    pub capabilities: Vec<String>,
    pub pack: &'a [u8],
}

impl<'a> PushRequest<'a> {
    pub fn parse(body: &'a [u8]) -> Result<Self> {
        let mut reader = PktReader::new(body);
        let mut commands = Vec::new();
        let mut capabilities = Vec::new();
        loop {
            let line = reader.expect()?;
            if line.is_flush() {
                break;
            }
            let Some(text) = line.text() else {
                return Err(Error::malformed("push command", "unexpected special packet"));
            };
            let (command, caps) = match text.iter().position(|&b| b == 0) {
                Some(nul) => (&text[..nul], Some(&text[nul + 1..])),
                None => (text, None),
            };
            let command = std::str::from_utf8(command)
                .map_err(|_| Error::malformed("push command", "not UTF-8"))?;
            if command.starts_with("shallow ") {
                return Err(Error::Unsupported("shallow push"));
            }
            if let Some(caps) = caps.filter(|_| commands.is_empty()) {
                capabilities = String::from_utf8_lossy(caps)
                    .split(' ')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            commands.push(RefCommand::parse(command)?);
        }
        Ok(Self {
            commands,
            capabilities,
            pack: reader.remaining(),
        })
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c == name)
    }
}

/// Outcome of one reference command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefStatus {
    Ok,
    Rejected(String),
}

impl RefStatus {
    fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

impl fmt::Display for RefStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Rejected(reason) => write!(f, "ng ({reason})"),
        }
    }
}

/// What a push did, plus the bytes to send back.
#[derive(Debug, Clone)]
pub struct PushReport {
    pub statuses: Vec<(String, RefStatus)>,
    pub objects_written: usize,
    pub response: Bytes,
}

impl PushReport {
    /// Number of reference commands that were applied.
    pub fn accepted(&self) -> usize {
        self.statuses.iter().filter(|(_, s)| *s == RefStatus::Ok).count()
    }

    pub fn rejected(&self) -> usize {
        self.statuses.len() - self.accepted()
    }
}

/// Runs a push against `storage`.
///
/// Every object in the pack is written before any reference moves, and
/// stays written whatever happens to the references. Each command is then
/// applied on its own with a compare-and-swap against the client's old
/// value; a lost race rejects only that reference.
pub async fn receive_pack(storage: &dyn GitStorage, body: &[u8]) -> Result<PushReport> {
    let request = PushRequest::parse(body)?;

    let objects = read_pack(request.pack, storage).await?;
    for object in &objects {
        storage.put_object(object).await?;
    }
    debug!(objects = objects.len(), "pack objects written");

    let config = storage.config().await?;
    let deny_delete_current = config.get_bool("receive.denyDeleteCurrent").unwrap_or(true);
    let deny_non_fast_forward = config.get_bool("receive.denyNonFastForwards").unwrap_or(false);
    let current_branch = match storage.head_target().await {
        Ok(target) => target,
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    let mut statuses = Vec::with_capacity(request.commands.len());
    for command in &request.commands {
        let status = if let Err(e) = validate_ref_name(&command.name) {
            debug!(reference = %command.name, error = %e, "invalid reference name");
            RefStatus::rejected("funny refname")
        } else if command.is_delete() {
            if deny_delete_current && current_branch.as_deref() == Some(command.name.as_str()) {
                RefStatus::rejected("deletion of the current branch prohibited")
            } else {
                let expected = Reference::direct(&command.name, command.old);
                cas_status(storage.compare_and_remove(&expected).await)?
            }
        } else if !storage.has_object(&command.new).await? {
            RefStatus::rejected("missing necessary objects")
        } else if deny_non_fast_forward
            && !command.is_create()
            && !is_ancestor(storage, command.old, command.new).await?
        {
            RefStatus::rejected("non-fast-forward")
        } else {
            let new = Reference::direct(&command.name, command.new);
            let expected = (!command.is_create()).then(|| Reference::direct(&command.name, command.old));
            cas_status(storage.compare_and_set(&new, expected.as_ref()).await)?
        };
        debug!(reference = %command.name, old = %command.old, new = %command.new, status = %status, "reference command");
        statuses.push((command.name.clone(), status));
    }

    let response = report(&request, &statuses)?;
    let report = PushReport {
        statuses,
        objects_written: objects.len(),
        response,
    };
    info!(
        commands = request.commands.len(),
        accepted = report.accepted(),
        rejected = report.rejected(),
        objects = report.objects_written,
        "push processed"
    );
    Ok(report)
}

/// A lost compare-and-swap is a per-reference rejection; anything else fails the push.
fn cas_status(result: Result<()>) -> Result<RefStatus> {
    match result {
        Ok(()) => Ok(RefStatus::Ok),
        Err(e) if e.is_conflict() => {
            warn!(error = %e, "reference update lost a race");
            Ok(RefStatus::rejected("failed to lock"))
        },
        Err(e) => Err(e),
    }
}

/// Returns true if `old` is `new` or one of its ancestors.
async fn is_ancestor(storage: &dyn GitStorage, old: Hash, new: Hash) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([new]);
    while let Some(id) = queue.pop_front() {
        if id == old {
            return Ok(true);
        }
        if !seen.insert(id) || seen.len() > MAX_ANCESTRY_WALK {
            continue;
        }
        let commit = match storage.object(&id, Some(ObjectKind::Commit)).await {
            Ok(commit) => commit,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };
        queue.extend(parse_commit(commit.data())?.parents);
    }
    Ok(false)
}

/// Builds the `report-status` response, inside side-band when negotiated.
fn report(request: &PushRequest<'_>, statuses: &[(String, RefStatus)]) -> Result<Bytes> {
    if !request.has_capability("report-status") {
        return Ok(Bytes::new());
    }

    let mut status = PktWriter::new();
    status.text("unpack ok")?;
    for (name, ref_status) in statuses {
        match ref_status {
            RefStatus::Ok => status.text(&format!("ok {name}"))?,
            RefStatus::Rejected(reason) => status.text(&format!("ng {name} {reason}"))?,
        };
    }
    status.flush();
    let status = status.freeze();

    let mode = SideBand::from_capabilities(request.capabilities.iter().map(String::as_str));
    if mode == SideBand::None {
        return Ok(status);
    }
    let mut w = PktWriter::new();
    w.band(mode, Band::Data, &status)?;
    w.flush();
    Ok(w.freeze())
}

//! Provisioning orchestration.
//!
//! Stages run strictly in order and the first failure aborts the run:
//!
//! 1. ResolveIdentity: validate inputs, check tools, run every collision check
//! 2. GenerateSshCredential: drop any stale key, generate a fresh one
//! 3. WriteSshConfigBlock / WriteIncludeBlock: managed blocks in shared files
//! 4. WritePerIdentityConfig
//! 5. With a token: AuthenticateRemote, VerifyScopes, UploadSshKey
//! 6. With signing: GenerateSigningCredential, UploadSigningKey (token only)
//! 7. ConnectivityProbe (only when the SSH key was uploaded)
//! 8. PersistManifest
//!
//! The manifest is written only after every other stage succeeded. A re-run
//! retires the remote keys of the previous run before uploading new ones;
//! without a token the previous remote records are carried into the new
//! manifest so deprovisioning can still find them.

pub mod render;

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::block::guard::{self, GuardError};
use crate::block::{self, BlockError, BlockOutcome, Insertion, Markers};
use crate::capability::{CapabilityError, DeleteOutcome, GitProtocol, KeyGen, KeyKind, RemoteHost, SigningIdentity};
use crate::consts::{PROBE_EXPECTED_EXIT, SCOPE_GPG_KEY, SCOPE_PUBLIC_KEY};
use crate::identity::{Alias, Identity, IdentityError};
use crate::layout::{Layout, public_key_path};
use crate::manifest::{
  self, ManagedBlocks, Manifest, ManifestError, ProvisionFlags, RemoteObject, SigningArtifact, SshArtifact,
};

/// Resolved inputs for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
  pub alias: String,
  /// Account name on the remote host.
  pub user: String,
  pub email: String,
  pub workspace: PathBuf,
  pub host: String,
  /// Access token; without one, remote registration is left to the user.
  pub token: Option<String>,
  pub signing: bool,
}

/// Provisioning stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
  ResolveIdentity,
  GenerateSshCredential,
  WriteSshConfigBlock,
  WriteIncludeBlock,
  WritePerIdentityConfig,
  AuthenticateRemote,
  VerifyScopes,
  UploadSshKey,
  GenerateSigningCredential,
  UploadSigningKey,
  ConnectivityProbe,
  PersistManifest,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::ResolveIdentity => "resolve identity",
      Stage::GenerateSshCredential => "generate ssh key",
      Stage::WriteSshConfigBlock => "write ssh config",
      Stage::WriteIncludeBlock => "write git include",
      Stage::WritePerIdentityConfig => "write identity config",
      Stage::AuthenticateRemote => "authenticate",
      Stage::VerifyScopes => "verify scopes",
      Stage::UploadSshKey => "upload ssh key",
      Stage::GenerateSigningCredential => "generate signing key",
      Stage::UploadSigningKey => "upload signing key",
      Stage::ConnectivityProbe => "connectivity probe",
      Stage::PersistManifest => "persist manifest",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error(transparent)]
  Identity(#[from] IdentityError),

  #[error("workspace directory {0} does not exist")]
  WorkspaceMissing(PathBuf),

  #[error(transparent)]
  Collision(#[from] GuardError),

  #[error("{stage} failed: {source}")]
  Capability {
    stage: Stage,
    #[source]
    source: CapabilityError,
  },

  #[error("token is missing required scopes ({missing}); run `{remediation}` and retry")]
  MissingScopes { missing: String, remediation: String },

  #[error("connectivity probe through '{alias}' failed with exit code {code}")]
  Probe { alias: String, code: i32 },

  #[error(transparent)]
  Block(#[from] BlockError),

  #[error("failed to update {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

impl ProvisionError {
  fn io(path: &Path, source: io::Error) -> Self {
    Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

fn at(stage: Stage) -> impl FnOnce(CapabilityError) -> ProvisionError {
  move |source| ProvisionError::Capability { stage, source }
}

/// Result of the connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeResult {
  /// No key was uploaded, so there is nothing to probe yet.
  Skipped,
  Reachable { code: i32 },
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
  pub manifest: Manifest,
  pub manifest_path: PathBuf,
  pub ssh_block: BlockOutcome,
  pub include_block: BlockOutcome,
  pub probe: ProbeResult,
  /// Steps the user must finish by hand (remote registration without a token).
  pub manual_steps: Vec<String>,
}

/// Everything resolved in the first stage and threaded through the rest.
struct ProvisionContext<'a> {
  identity: Identity,
  layout: &'a Layout,
  host: &'a str,
  token: Option<&'a str>,
  signing: bool,
  markers: Markers,
  identity_config_name: String,
  /// Manifest left by an earlier run for the same alias.
  previous: Option<Manifest>,
}

impl ProvisionContext<'_> {
  fn identity_config_path(&self) -> PathBuf {
    self.layout.identity_config(&self.identity.alias)
  }
}

/// Scopes a token must carry for the requested uploads.
pub fn required_scopes(signing: bool) -> BTreeSet<String> {
  let mut scopes = BTreeSet::from([SCOPE_PUBLIC_KEY.to_string()]);
  if signing {
    scopes.insert(SCOPE_GPG_KEY.to_string());
  }
  scopes
}

fn now_secs() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}

/// Provision one identity end to end.
pub async fn provision<K: KeyGen, R: RemoteHost>(
  request: &ProvisionRequest,
  layout: &Layout,
  keygen: &K,
  remote: &R,
) -> Result<ProvisionReport, ProvisionError> {
  let ctx = resolve_identity(request, layout, keygen, remote)?;
  info!(alias = %ctx.identity.alias, namespace = %ctx.identity.namespace, "provisioning identity");

  let mut ssh = generate_ssh_credential(&ctx, keygen).await?;

  let ssh_insertion = write_ssh_config_block(&ctx, &ssh)?;
  let include_insertion = write_include_block(&ctx)?;
  write_identity_config(&ctx, None)?;

  let mut flags = ProvisionFlags::default();
  let mut manual_steps = Vec::new();

  if let Some(token) = ctx.token {
    remote
      .authenticate(token, GitProtocol::Ssh)
      .await
      .map_err(at(Stage::AuthenticateRemote))?;
    flags.login_performed = true;

    remote
      .switch_active_user(&ctx.identity.user)
      .await
      .map_err(at(Stage::AuthenticateRemote))?;
    flags.user_switched = true;

    verify_scopes(&ctx, remote).await?;
    flags.scopes_verified = true;

    ssh.remote = Some(upload_ssh_key(&ctx, &ssh, remote).await?);
  } else {
    info!("no token supplied, skipping remote registration");
    manual_steps.push(format!(
      "Add {} at https://{}/settings/ssh/new (title: \"{}\")",
      ssh.public_path.display(),
      ctx.host,
      ctx.identity.tag()
    ));
  }

  let signing = if ctx.signing {
    let mut artifact = generate_signing_credential(&ctx, keygen).await?;
    write_identity_config(&ctx, Some(&artifact.fingerprint))?;

    if ctx.token.is_some() {
      artifact.remote = Some(upload_signing_key(&ctx, &artifact, keygen, remote).await?);
    } else {
      manual_steps.push(format!(
        "Add the signing key at https://{}/settings/gpg/new (export it with `gpg --armor --export {}`)",
        ctx.host, artifact.fingerprint
      ));
    }
    Some(artifact)
  } else {
    None
  };

  let probe = if ssh.remote.is_some() {
    connectivity_probe(&ctx, remote).await?
  } else {
    manual_steps.push(format!("Verify access with `ssh -T git@{}`", ctx.identity.alias));
    ProbeResult::Skipped
  };

  flags.created_at = now_secs();
  let blocks = ManagedBlocks {
    ssh_config: ctx.layout.ssh_config(),
    ssh_block: ssh_insertion.block,
    git_config: ctx.layout.git_config(),
    include_block: include_insertion.block,
    identity_config: ctx.identity_config_path(),
  };
  let mut manifest = Manifest::build(&ctx.identity, ctx.host, Some(&ssh), signing.as_ref(), &blocks, &flags);
  if let Some(previous) = &ctx.previous {
    manual_steps.extend(carry_remote_records(&mut manifest, previous));
  }
  let manifest_path = ctx.layout.manifest_path(&ctx.identity.namespace);
  manifest::persist(&manifest, &manifest_path)?;

  info!(alias = %ctx.identity.alias, manifest = %manifest_path.display(), "identity provisioned");

  Ok(ProvisionReport {
    manifest,
    manifest_path,
    ssh_block: ssh_insertion.outcome,
    include_block: include_insertion.outcome,
    probe,
    manual_steps,
  })
}

fn resolve_identity<'a, K: KeyGen, R: RemoteHost>(
  request: &'a ProvisionRequest,
  layout: &'a Layout,
  keygen: &K,
  remote: &R,
) -> Result<ProvisionContext<'a>, ProvisionError> {
  let alias = Alias::parse(&request.alias)?;

  if !request.workspace.is_dir() {
    return Err(ProvisionError::WorkspaceMissing(request.workspace.clone()));
  }
  let workspace = dunce::canonicalize(&request.workspace).map_err(|e| ProvisionError::io(&request.workspace, e))?;
  let identity = Identity::new(alias, workspace, &request.user, &request.email)?;

  let markers = Markers::new(&identity.namespace, &identity.alias);
  let identity_config_name = Layout::identity_config_name(&identity.alias);

  guard::check_file(
    &layout.ssh_config(),
    &render::ssh_conflict_pattern(identity.alias.as_str()),
    &markers,
  )?;
  guard::check_file(
    &layout.git_config(),
    &render::include_conflict_pattern(&identity_config_name),
    &markers,
  )?;

  // a per-identity file without our include block was not written by us
  let identity_config = layout.identity_config(&identity.alias);
  if identity_config.exists() {
    let root = block::read_or_empty(&layout.git_config()).map_err(GuardError::from)?;
    if !block::contains_line(&root, &markers.begin) {
      return Err(
        GuardError::Blocked {
          path: identity_config,
          pattern: identity_config_name,
        }
        .into(),
      );
    }
  }

  let previous = match manifest::load(&layout.manifest_path(&identity.namespace)) {
    Ok(previous) => Some(previous),
    Err(ManifestError::NotFound(_)) => None,
    Err(e) => {
      warn!(error = %e, "ignoring unreadable manifest from a previous run");
      None
    }
  };

  keygen.check_available(request.signing).map_err(at(Stage::ResolveIdentity))?;
  let token = request.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
  if token.is_some() {
    remote.check_available().map_err(at(Stage::ResolveIdentity))?;
  }

  Ok(ProvisionContext {
    identity,
    layout,
    host: request.host.as_str(),
    token,
    signing: request.signing,
    markers,
    identity_config_name,
    previous,
  })
}

fn remove_if_exists(path: &Path) -> Result<(), ProvisionError> {
  match fs::remove_file(path) {
    Ok(()) => {
      info!(path = %path.display(), "removed stale key file");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(ProvisionError::io(path, e)),
  }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::DirBuilderExt;

  if path.is_dir() {
    return Ok(());
  }
  fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
  fs::create_dir_all(path)
}

async fn generate_ssh_credential<K: KeyGen>(ctx: &ProvisionContext<'_>, keygen: &K) -> Result<SshArtifact, ProvisionError> {
  let ssh_dir = ctx.layout.ssh_dir();
  create_private_dir(&ssh_dir).map_err(|e| ProvisionError::io(&ssh_dir, e))?;

  let key_path = ctx.layout.ssh_key(&ctx.identity.alias);
  remove_if_exists(&key_path)?;
  remove_if_exists(&public_key_path(&key_path))?;

  let pair = keygen
    .create_ssh_keypair(&key_path, &ctx.identity.tag())
    .await
    .map_err(at(Stage::GenerateSshCredential))?;

  Ok(SshArtifact {
    private_path: pair.private_path,
    public_path: pair.public_path,
    created: true,
    reused: false,
    remote: None,
  })
}

fn write_ssh_config_block(ctx: &ProvisionContext<'_>, ssh: &SshArtifact) -> Result<Insertion, ProvisionError> {
  let body = render::ssh_config_body(ctx.identity.alias.as_str(), ctx.host, &ssh.private_path);
  let text = block::render(&ctx.markers, &body);
  Ok(block::upsert_file(&ctx.layout.ssh_config(), &text, &ctx.markers)?)
}

fn write_include_block(ctx: &ProvisionContext<'_>) -> Result<Insertion, ProvisionError> {
  let body = render::include_body(&ctx.identity.workspace, &ctx.identity_config_name);
  let text = block::render(&ctx.markers, &body);
  Ok(block::upsert_file(&ctx.layout.git_config(), &text, &ctx.markers)?)
}

fn write_identity_config(ctx: &ProvisionContext<'_>, signing_key: Option<&str>) -> Result<(), ProvisionError> {
  let path = ctx.identity_config_path();
  let content = render::identity_config(&ctx.identity, ctx.host, signing_key);
  fs::write(&path, content).map_err(|e| ProvisionError::io(&path, e))?;
  info!(path = %path.display(), "identity config written");
  Ok(())
}

async fn verify_scopes<R: RemoteHost>(ctx: &ProvisionContext<'_>, remote: &R) -> Result<(), ProvisionError> {
  let granted = remote.current_scopes().await.map_err(at(Stage::VerifyScopes))?;
  let required = required_scopes(ctx.signing);
  let missing: Vec<&str> = required
    .iter()
    .filter(|scope| !granted.contains(*scope))
    .map(String::as_str)
    .collect();

  if missing.is_empty() {
    return Ok(());
  }

  warn!(missing = ?missing, "token lacks required scopes");
  Err(ProvisionError::MissingScopes {
    missing: missing.join(", "),
    remediation: format!(
      "gh auth refresh -h {} -s {}",
      ctx.host,
      required.iter().cloned().collect::<Vec<_>>().join(",")
    ),
  })
}

/// Delete remote keys an earlier run registered for this identity: the id
/// recorded in its manifest plus any listed key titled with our tag.
async fn retire_previous<R: RemoteHost>(
  ctx: &ProvisionContext<'_>,
  kind: KeyKind,
  recorded: Option<&str>,
  remote: &R,
  stage: Stage,
) -> Result<(), ProvisionError> {
  let tag = ctx.identity.tag();
  let mut ids: BTreeSet<String> = recorded.map(str::to_string).into_iter().collect();
  let listed = remote.list_keys(kind).await.map_err(at(stage))?;
  ids.extend(
    listed
      .into_iter()
      .filter(|k| k.title.as_deref() == Some(tag.as_str()))
      .map(|k| k.id),
  );

  for id in ids {
    match remote.delete_key(kind, &id).await.map_err(at(stage))? {
      DeleteOutcome::Deleted => info!(kind = %kind, id = %id, "retired previous remote key"),
      DeleteOutcome::NotFound => debug!(kind = %kind, id = %id, "previous remote key already gone"),
    }
  }
  Ok(())
}

/// Keep remote records from `previous` that this run did not replace.
///
/// Returns manual steps for the keys that are now stale.
fn carry_remote_records(manifest: &mut Manifest, previous: &Manifest) -> Vec<String> {
  let mut steps = Vec::new();
  let host = previous.host.as_str();

  if manifest.ssh.remote_id.is_none() && previous.ssh_remote_registered() {
    manifest.ssh.remote_id = previous.ssh.remote_id.clone();
    manifest.ssh.remote_title = previous.ssh.remote_title.clone();
    steps.push(format!(
      "Remove the previous SSH key '{}' at https://{}/settings/keys",
      previous.ssh.remote_title.as_deref().unwrap_or(previous.alias.as_str()),
      host
    ));
  }
  if manifest.signing.remote_id.is_none() && previous.signing_remote_registered() {
    manifest.signing.remote_id = previous.signing.remote_id.clone();
    manifest.signing.remote_title = previous.signing.remote_title.clone();
    steps.push(format!(
      "Remove the previous signing key '{}' at https://{}/settings/keys",
      previous.signing.remote_title.as_deref().unwrap_or(previous.alias.as_str()),
      host
    ));
  }
  steps
}

async fn upload_ssh_key<R: RemoteHost>(
  ctx: &ProvisionContext<'_>,
  ssh: &SshArtifact,
  remote: &R,
) -> Result<RemoteObject, ProvisionError> {
  let material = fs::read_to_string(&ssh.public_path).map_err(|e| ProvisionError::io(&ssh.public_path, e))?;
  let recorded = ctx.previous.as_ref().and_then(|m| m.ssh.remote_id.as_deref());
  retire_previous(ctx, KeyKind::Ssh, recorded, remote, Stage::UploadSshKey).await?;

  let title = ctx.identity.tag();
  let id = remote
    .upload_public_key(KeyKind::Ssh, &material, &title)
    .await
    .map_err(at(Stage::UploadSshKey))?;
  info!(id = %id, title = %title, "ssh key registered");
  Ok(RemoteObject { id, title })
}

async fn generate_signing_credential<K: KeyGen>(
  ctx: &ProvisionContext<'_>,
  keygen: &K,
) -> Result<SigningArtifact, ProvisionError> {
  let tag = ctx.identity.tag();

  // only keys carrying this identity's tag; other keys for the address stay
  let existing = keygen
    .list_by_contact(&ctx.identity.email)
    .await
    .map_err(at(Stage::GenerateSigningCredential))?;
  for key in existing.iter().filter(|k| k.comment.as_deref() == Some(tag.as_str())) {
    info!(fingerprint = %key.fingerprint, "removing previous signing key for identity");
    keygen
      .delete_keypair_by_fingerprint(&key.fingerprint)
      .await
      .map_err(at(Stage::GenerateSigningCredential))?;
  }

  let signer = SigningIdentity {
    name: &ctx.identity.user,
    email: &ctx.identity.email,
  };
  let fingerprint = keygen
    .create_signing_keypair(&signer, &tag)
    .await
    .map_err(at(Stage::GenerateSigningCredential))?;

  Ok(SigningArtifact {
    fingerprint,
    comment: tag,
    created: true,
    remote: None,
  })
}

async fn upload_signing_key<K: KeyGen, R: RemoteHost>(
  ctx: &ProvisionContext<'_>,
  signing: &SigningArtifact,
  keygen: &K,
  remote: &R,
) -> Result<RemoteObject, ProvisionError> {
  let armored = keygen
    .export_public(&signing.fingerprint)
    .await
    .map_err(at(Stage::UploadSigningKey))?;
  let recorded = ctx.previous.as_ref().and_then(|m| m.signing.remote_id.as_deref());
  retire_previous(ctx, KeyKind::Signing, recorded, remote, Stage::UploadSigningKey).await?;

  let title = ctx.identity.tag();
  let id = remote
    .upload_public_key(KeyKind::Signing, &armored, &title)
    .await
    .map_err(at(Stage::UploadSigningKey))?;
  info!(id = %id, fingerprint = %signing.fingerprint, "signing key registered");
  Ok(RemoteObject { id, title })
}

async fn connectivity_probe<R: RemoteHost>(ctx: &ProvisionContext<'_>, remote: &R) -> Result<ProbeResult, ProvisionError> {
  let alias = ctx.identity.alias.as_str();
  let code = remote
    .probe_connectivity(alias)
    .await
    .map_err(at(Stage::ConnectivityProbe))?;

  if code == 0 || code == PROBE_EXPECTED_EXIT {
    info!(alias = %alias, code = code, "remote reachable");
    Ok(ProbeResult::Reachable { code })
  } else {
    Err(ProvisionError::Probe {
      alias: alias.to_string(),
      code,
    })
  }
}

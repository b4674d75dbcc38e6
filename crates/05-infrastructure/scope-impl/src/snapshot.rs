//! 会话快照与恢复

use crate::scopes::SessionScope;
use parking_lot::RwLock;
use scope_abstractions::{
    restore_fn_for, AttributeValue, RestoreError, RestoreFn, Scope, SessionApplicationSnapshot,
    SessionSnapshot, SnapshotEntry, Snapshotable, SESSION_SNAPSHOT_FORMAT_VERSION,
};
use scope_common::{ScopeError, ScopeResult};
use std::collections::HashMap;
use tracing::{debug, info};

/// 从快照恢复出的属性
pub(crate) type RestoredAttributes = Vec<(String, AttributeValue)>;

/// 从快照恢复出的会话内容
#[derive(Debug, Default)]
pub(crate) struct RestoredSession {
    pub(crate) attributes: RestoredAttributes,
    pub(crate) applications: Vec<(String, RestoredAttributes)>,
}

/// 快照类型注册表
///
/// 快照类型名到恢复函数的映射。只有具备快照能力的属性会进入快照，
/// 其余属性在会话迁移时丢弃。
#[derive(Default)]
pub struct SnapshotRegistry {
    restorers: RwLock<HashMap<String, RestoreFn>>,
}

impl std::fmt::Debug for SnapshotRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.restorers.read().keys().cloned().collect();
        types.sort();
        f.debug_struct("SnapshotRegistry")
            .field("snapshot_types", &types)
            .finish()
    }
}

impl SnapshotRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册可快照类型
    pub fn register<T: Snapshotable>(&self) {
        self.register_fn(T::SNAPSHOT_TYPE, restore_fn_for::<T>());
    }

    /// 注册自定义恢复函数
    pub fn register_fn(&self, snapshot_type: impl Into<String>, restore: RestoreFn) {
        let snapshot_type = snapshot_type.into();
        debug!("注册快照类型: {}", snapshot_type);
        self.restorers.write().insert(snapshot_type, restore);
    }

    /// 是否已注册快照类型
    pub fn is_registered(&self, snapshot_type: &str) -> bool {
        self.restorers.read().contains_key(snapshot_type)
    }

    /// 生成会话快照，包含会话及其会话应用作用域中所有可快照属性
    pub fn snapshot_session(&self, session: &SessionScope) -> ScopeResult<SessionSnapshot> {
        let mut snapshot = SessionSnapshot::new(session.id());
        snapshot.entries = snapshot_entries(session)?;
        for application in session.all_session_application_scopes() {
            let entries = snapshot_entries(application.as_ref())?;
            if !entries.is_empty() {
                snapshot.applications.push(SessionApplicationSnapshot {
                    application_id: application.id().to_string(),
                    entries,
                });
            }
        }
        info!(
            "会话快照已生成: {} ({} 个属性)",
            snapshot.session_id,
            snapshot.entry_count()
        );
        Ok(snapshot)
    }

    /// 恢复快照中的所有属性值，任何一项失败则整体失败
    pub(crate) fn restore(&self, snapshot: &SessionSnapshot) -> ScopeResult<RestoredSession> {
        if snapshot.format_version != SESSION_SNAPSHOT_FORMAT_VERSION {
            return Err(ScopeError::UnsupportedSnapshotVersion {
                snapshot_type: "session".to_string(),
                version: snapshot.format_version,
            });
        }

        let mut restored = RestoredSession {
            attributes: self.restore_entries(&snapshot.entries)?,
            applications: Vec::with_capacity(snapshot.applications.len()),
        };
        for application in &snapshot.applications {
            restored.applications.push((
                application.application_id.clone(),
                self.restore_entries(&application.entries)?,
            ));
        }
        Ok(restored)
    }

    fn restore_entries(&self, entries: &[SnapshotEntry]) -> ScopeResult<RestoredAttributes> {
        let restorers = self.restorers.read();
        entries
            .iter()
            .map(|entry| -> ScopeResult<(String, AttributeValue)> {
                let restore = restorers.get(&entry.snapshot_type).ok_or_else(|| {
                    ScopeError::UnknownSnapshotType {
                        snapshot_type: entry.snapshot_type.clone(),
                    }
                })?;
                let value = restore(entry.version, entry.data.clone()).map_err(|e| match e {
                    RestoreError::UnsupportedVersion(version) => {
                        ScopeError::UnsupportedSnapshotVersion {
                            snapshot_type: entry.snapshot_type.clone(),
                            version,
                        }
                    }
                    RestoreError::Invalid(source) => ScopeError::SnapshotFailed {
                        attribute_name: entry.attribute_name.clone(),
                        message: source.to_string(),
                    },
                })?;
                Ok((entry.attribute_name.clone(), value))
            })
            .collect()
    }
}

fn snapshot_entries(scope: &dyn Scope) -> ScopeResult<Vec<SnapshotEntry>> {
    let mut entries = Vec::new();
    for (name, value) in scope.all_attributes()? {
        let Some(snapshot) = value.as_snapshot() else {
            continue;
        };
        let data = snapshot
            .snapshot()
            .map_err(|e| ScopeError::SnapshotFailed {
                attribute_name: name.clone(),
                message: e.to_string(),
            })?;
        entries.push(SnapshotEntry {
            attribute_name: name,
            snapshot_type: snapshot.snapshot_type().to_string(),
            version: snapshot.snapshot_version(),
            data,
        });
    }
    Ok(entries)
}

use dip_core::domain::{AccessEndpoint, Cluster, Deployment, Pool, PoolSize, Volume, VolumeBinding};
use dip_core::{AccessType, ConfigMap, Error, Provider, Result, Status};
use sqlx::{Pool as PgPool, Postgres};
use uuid::Uuid;

use crate::rows::{AccessEndpointRow, ClusterRow, DeploymentRow, PoolRow, VolumeBindingRow, VolumeRow};

const UNIQUE_VIOLATION: &str = "23505";

/// Maps a raw `sqlx::Error` the way §4.1/§7 require: unique-constraint
/// violations become `conflict`, a missing row becomes `not_found`,
/// everything else is `internal_error`.
fn map_db_error(e: sqlx::Error, entity: &str) -> Error {
    if let sqlx::Error::RowNotFound = e {
        return Error::not_found(entity);
    }
    if let Some(db_err) = e.as_database_error() {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return Error::conflict(format!("{entity} name already in use"));
        }
    }
    Error::Internal(e.to_string())
}

/// Transactional CRUD over clusters, pools, deployments and volumes (C1).
/// Every write that needs to be atomic with a status/error-message update
/// (§4.1: "all orchestrator writes of (status, error_message) must be atomic
/// with any dependent field") goes through a single UPDATE statement rather
/// than a read-modify-write pair.
#[derive(Clone)]
pub struct Store {
    pool: PgPool<Postgres>,
}

impl Store {
    pub fn new(pool: PgPool<Postgres>) -> Self {
        Self { pool }
    }

    // ---- clusters -----------------------------------------------------

    pub async fn create_cluster(
        &self,
        id: Uuid,
        name: &str,
        provider: Provider,
        provider_credentials: &str,
        k3s_version: &str,
        domain: Option<&str>,
        traefik_dashboard_enabled: bool,
        traefik_dashboard_password_hash: Option<&str>,
    ) -> Result<Cluster> {
        let row: ClusterRow = sqlx::query_as(
            r#"
            INSERT INTO clusters
                (id, name, provider, provider_credentials, k3s_version, domain,
                 status, traefik_dashboard_enabled, traefik_dashboard_password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(provider)
        .bind(provider_credentials)
        .bind(k3s_version)
        .bind(domain)
        .bind(traefik_dashboard_enabled)
        .bind(traefik_dashboard_password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "cluster"))?;

        Ok(row.into_domain())
    }

    pub async fn get_cluster_row(&self, id: Uuid) -> Result<ClusterRow> {
        sqlx::query_as("SELECT * FROM clusters WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "cluster"))
    }

    pub async fn get_cluster(&self, id: Uuid) -> Result<Cluster> {
        Ok(self.get_cluster_row(id).await?.into_domain())
    }

    pub async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let rows: Vec<ClusterRow> = sqlx::query_as("SELECT * FROM clusters ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "cluster"))?;
        Ok(rows.into_iter().map(ClusterRow::into_domain).collect())
    }

    /// Atomically updates lifecycle status, error message, and access IP —
    /// the triple spec.md §4.8 names as the per-cluster worker's only
    /// writable fields.
    pub async fn update_cluster_status(
        &self,
        id: Uuid,
        status: Status,
        error_message: Option<&str>,
        access_ip: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE clusters
            SET status = $2,
                error_message = $3,
                access_ip = COALESCE($4, access_ip),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .bind(access_ip)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "cluster"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("cluster"));
        }
        Ok(())
    }

    pub async fn set_cluster_kubeconfig(&self, id: Uuid, kubeconfig: &str) -> Result<()> {
        sqlx::query("UPDATE clusters SET kubeconfig = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(kubeconfig)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "cluster"))?;
        Ok(())
    }

    pub async fn set_cluster_ssh_key(&self, id: Uuid, private_key: &str) -> Result<()> {
        sqlx::query("UPDATE clusters SET ssh_private_key = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(private_key)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "cluster"))?;
        Ok(())
    }

    /// Records the provider IDs of the cluster-shared ssh key/firewall/
    /// network as each is created, so [`Store::delete_cluster`]'s caller can
    /// tear them down directly rather than rediscovering them by name.
    pub async fn set_cluster_shared_resource_ids(
        &self,
        id: Uuid,
        ssh_key_provider_id: Option<&str>,
        firewall_provider_id: Option<&str>,
        network_provider_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE clusters
            SET ssh_key_provider_id = COALESCE($2, ssh_key_provider_id),
                firewall_provider_id = COALESCE($3, firewall_provider_id),
                network_provider_id = COALESCE($4, network_provider_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(ssh_key_provider_id)
        .bind(firewall_provider_id)
        .bind(network_provider_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "cluster"))?;
        Ok(())
    }

    /// Cascades to pools/deployments/endpoints/bindings via `ON DELETE
    /// CASCADE` in a single statement, satisfying §8's "in the same
    /// transaction" testable property without a separate explicit `BEGIN`.
    pub async fn delete_cluster(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM clusters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "cluster"))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("cluster"));
        }
        Ok(())
    }

    // ---- pools ----------------------------------------------------------

    pub async fn create_pool(
        &self,
        id: Uuid,
        cluster_id: Uuid,
        name: &str,
        node_type: &str,
        region: &str,
        is_control_plane: bool,
        size: PoolSize,
    ) -> Result<Pool> {
        let (fixed_count, autoscale_min, autoscale_max) = match size {
            PoolSize::Fixed { count } => (Some(count as i32), None, None),
            PoolSize::Autoscaling { min, max } => (None, Some(min as i32), Some(max as i32)),
        };
        let row: PoolRow = sqlx::query_as(
            r#"
            INSERT INTO pools
                (id, cluster_id, name, node_type, region, is_control_plane,
                 fixed_count, autoscale_min, autoscale_max)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cluster_id)
        .bind(name)
        .bind(node_type)
        .bind(region)
        .bind(is_control_plane)
        .bind(fixed_count)
        .bind(autoscale_min)
        .bind(autoscale_max)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "pool"))?;

        Ok(row.into_domain())
    }

    pub async fn list_pools(&self, cluster_id: Uuid) -> Result<Vec<Pool>> {
        let rows: Vec<PoolRow> = sqlx::query_as("SELECT * FROM pools WHERE cluster_id = $1 ORDER BY name")
            .bind(cluster_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "pool"))?;
        Ok(rows.into_iter().map(PoolRow::into_domain).collect())
    }

    pub async fn get_pool_by_name(&self, cluster_id: Uuid, name: &str) -> Result<Pool> {
        let row: PoolRow = sqlx::query_as("SELECT * FROM pools WHERE cluster_id = $1 AND name = $2")
            .bind(cluster_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "pool"))?;
        Ok(row.into_domain())
    }

    // ---- volumes ----------------------------------------------------------

    pub async fn create_volume(
        &self,
        id: Uuid,
        cluster_id: Uuid,
        name: &str,
        size_gb: u32,
        description: Option<&str>,
    ) -> Result<Volume> {
        sqlx::query_as::<_, VolumeRow>(
            r#"
            INSERT INTO volumes (id, cluster_id, name, size_gb, description, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING *, FALSE AS in_use
            "#,
        )
        .bind(id)
        .bind(cluster_id)
        .bind(name)
        .bind(size_gb as i32)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "volume"))
        .map(VolumeRow::into_domain)
    }

    pub async fn list_volumes(&self, cluster_id: Uuid) -> Result<Vec<Volume>> {
        let rows: Vec<VolumeRow> = sqlx::query_as(
            r#"
            SELECT v.*,
                   EXISTS (
                       SELECT 1 FROM deployment_volume_bindings b WHERE b.volume_name = v.name
                   ) AS in_use
            FROM volumes v
            WHERE v.cluster_id = $1
            ORDER BY v.created_at
            "#,
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "volume"))?;
        Ok(rows.into_iter().map(VolumeRow::into_domain).collect())
    }

    /// Records the Hetzner volume ID once `dip-provider` has actually
    /// created the backing resource, so teardown can address it without
    /// relisting by label.
    pub async fn set_volume_provider_id(&self, id: Uuid, provider_volume_id: &str) -> Result<()> {
        sqlx::query("UPDATE volumes SET provider_volume_id = $2 WHERE id = $1")
            .bind(id)
            .bind(provider_volume_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "volume"))?;
        Ok(())
    }

    pub async fn get_volume(&self, id: Uuid) -> Result<Volume> {
        let row: VolumeRow = sqlx::query_as(
            r#"
            SELECT v.*,
                   EXISTS (
                       SELECT 1 FROM deployment_volume_bindings b WHERE b.volume_name = v.name
                   ) AS in_use
            FROM volumes v
            WHERE v.id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "volume"))?;
        Ok(row.into_domain())
    }

    /// Internal variant of [`Store::get_volume`] exposing `provider_volume_id`,
    /// needed by the orchestrator to attach/detach/delete the backing cloud
    /// resource but never returned to API callers.
    pub async fn get_volume_row(&self, id: Uuid) -> Result<VolumeRow> {
        sqlx::query_as(
            r#"
            SELECT v.*,
                   EXISTS (
                       SELECT 1 FROM deployment_volume_bindings b WHERE b.volume_name = v.name
                   ) AS in_use
            FROM volumes v
            WHERE v.id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "volume"))
    }

    pub async fn update_volume_status(&self, id: Uuid, status: Status) -> Result<()> {
        sqlx::query("UPDATE volumes SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "volume"))?;
        Ok(())
    }

    /// Enforced at the row level per §8's invariant: a volume is in-use iff
    /// a `deployment_volume_bindings` row references its name, so this is a
    /// read, not a stored flag that can drift.
    pub async fn delete_volume(&self, id: Uuid) -> Result<()> {
        let volume = self.get_volume(id).await?;
        if volume.in_use {
            return Err(Error::conflict("volume is in use"));
        }
        let result = sqlx::query("DELETE FROM volumes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "volume"))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("volume"));
        }
        Ok(())
    }

    // ---- deployments ----------------------------------------------------------

    pub async fn create_deployment(
        &self,
        id: Uuid,
        cluster_id: Uuid,
        name: &str,
        application: &str,
        namespace: &str,
        helm_release_name: &str,
        bound_pool: Option<&str>,
        config: &ConfigMap,
    ) -> Result<Deployment> {
        let config_json = serde_json::to_value(config).map_err(|e| Error::Internal(e.to_string()))?;
        let row: DeploymentRow = sqlx::query_as(
            r#"
            INSERT INTO deployments
                (id, cluster_id, name, application, namespace, helm_release_name,
                 bound_pool, status, config)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cluster_id)
        .bind(name)
        .bind(application)
        .bind(namespace)
        .bind(helm_release_name)
        .bind(bound_pool)
        .bind(config_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "deployment"))?;

        Ok(row.into_domain(Vec::new(), Vec::new()))
    }

    async fn load_deployment_children(
        &self,
        deployment_id: Uuid,
    ) -> Result<(Vec<AccessEndpointRow>, Vec<VolumeBindingRow>)> {
        let endpoints: Vec<AccessEndpointRow> =
            sqlx::query_as("SELECT * FROM access_endpoints WHERE deployment_id = $1")
                .bind(deployment_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_db_error(e, "access_endpoint"))?;
        let bindings: Vec<VolumeBindingRow> =
            sqlx::query_as("SELECT * FROM deployment_volume_bindings WHERE deployment_id = $1")
                .bind(deployment_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_db_error(e, "volume_binding"))?;
        Ok((endpoints, bindings))
    }

    pub async fn get_deployment(&self, id: Uuid) -> Result<Deployment> {
        let row: DeploymentRow = sqlx::query_as("SELECT * FROM deployments WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "deployment"))?;
        let (endpoints, bindings) = self.load_deployment_children(id).await?;
        Ok(row.into_domain(endpoints, bindings))
    }

    pub async fn list_deployments(&self, cluster_id: Uuid) -> Result<Vec<Deployment>> {
        let rows: Vec<DeploymentRow> =
            sqlx::query_as("SELECT * FROM deployments WHERE cluster_id = $1 ORDER BY created_at")
                .bind(cluster_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_db_error(e, "deployment"))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let (endpoints, bindings) = self.load_deployment_children(row.id).await?;
            out.push(row.into_domain(endpoints, bindings));
        }
        Ok(out)
    }

    pub async fn update_deployment_status(
        &self,
        id: Uuid,
        status: Status,
        error_message: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE deployments SET status = $2, error_message = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "deployment"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("deployment"));
        }
        Ok(())
    }

    /// Renames and reconfigures a deployment as part of an update (§4.9:
    /// "the name may be changed ... but never the release name, which is
    /// immutable" — `helm_release_name` is deliberately absent from this
    /// statement's SET list).
    pub async fn update_deployment_fields(&self, id: Uuid, name: &str, config: &ConfigMap) -> Result<()> {
        let config_json = serde_json::to_value(config).map_err(|e| Error::Internal(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE deployments SET name = $2, config = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(config_json)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "deployment"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("deployment"));
        }
        Ok(())
    }

    /// Removes every endpoint row for a deployment, so an update can
    /// re-insert the caller's current endpoint set without leaving stale
    /// rows behind (`add_endpoint` only appends).
    pub async fn clear_endpoints(&self, deployment_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM access_endpoints WHERE deployment_id = $1")
            .bind(deployment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "access_endpoint"))?;
        Ok(())
    }

    /// Removes every volume binding for a deployment, mirroring
    /// [`Store::clear_endpoints`] for the same update-by-replace shape.
    pub async fn clear_volume_bindings(&self, deployment_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM deployment_volume_bindings WHERE deployment_id = $1")
            .bind(deployment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "volume_binding"))?;
        Ok(())
    }

    pub async fn delete_deployment(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM deployments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "deployment"))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("deployment"));
        }
        Ok(())
    }

    /// Inserts an endpoint, enforcing the cluster-wide `(access_type,
    /// normalized value)` uniqueness invariant (§3, §8 scenario 3) by
    /// checking across every deployment on the same cluster inside the same
    /// statement's transaction-free read — the orchestrator (§4.9) holds
    /// the per-cluster worker lock for the whole admission pass, so this
    /// check and the subsequent insert cannot race with another admission
    /// for the same cluster.
    pub async fn endpoint_value_in_use(
        &self,
        cluster_id: Uuid,
        access_type: AccessType,
        normalized_value: &str,
    ) -> Result<bool> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM access_endpoints e
            JOIN deployments d ON d.id = e.deployment_id
            WHERE d.cluster_id = $1 AND e.access_type = $2 AND e.value = $3 AND e.enabled
            "#,
        )
        .bind(cluster_id)
        .bind(access_type)
        .bind(normalized_value)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "access_endpoint"))?;
        Ok(row.0 > 0)
    }

    pub async fn add_endpoint(&self, deployment_id: Uuid, endpoint: &AccessEndpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_endpoints (id, deployment_id, name, access_type, value, enabled)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(deployment_id)
        .bind(&endpoint.name)
        .bind(endpoint.access_type)
        .bind(&endpoint.value)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "access_endpoint"))?;
        Ok(())
    }

    pub async fn add_volume_binding(&self, deployment_id: Uuid, binding: &VolumeBinding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deployment_volume_bindings (deployment_id, volume_name, mount_path)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(deployment_id)
        .bind(&binding.volume_name)
        .bind(&binding.mount_path)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "volume_binding"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_conflict() {
        let db_err = sqlx::Error::RowNotFound;
        assert!(matches!(map_db_error(db_err, "cluster"), Error::NotFound(_)));
    }
}

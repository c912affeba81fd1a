//! Workspace domain
//!
//! A domain moves through `Absent → Provisioning → Active → Deprovisioning →
//! Absent`. It holds exactly one user profile, and the profile holds exactly
//! one default application. Children are created only under an active parent
//! and released before the parent tears down.

use crate::keys::{EncryptionKey, KeyPurpose};
use enclave_core::{
    Arn, ArnContext, ConfigurationError, ConstructionError, DependencyOrderError,
    IdentifierKind, IdentifierSource, RemovalPolicy, Result, Tag,
};
use enclave_iam::{ManagedPolicy, Principal, Role};
use enclave_network::{NetworkPerimeter, WorkloadSecurityGroup};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Default domain name prefix
pub const DOMAIN_PREFIX: &str = "security-lake-gen-ai";
/// Default project tag value
pub const PROJECT_TAG: &str = "security-lake-gen-ai";
/// Name of the single application per profile
pub const DEFAULT_APP_NAME: &str = "default";
/// Default Jupyter server instance type
pub const DEFAULT_JUPYTER_INSTANCE: &str = "system";
/// Default kernel gateway instance type
pub const DEFAULT_KERNEL_GATEWAY_INSTANCE: &str = "ml.t3.medium";
/// Account publishing the data-science image
pub const DATA_SCIENCE_IMAGE_ACCOUNT: &str = "081325390199";

/// Domain lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainState {
    /// Not created, or fully removed
    Absent,
    /// Declared, prerequisites not yet confirmed
    Provisioning,
    /// Accepting user profiles
    Active,
    /// Tearing down
    Deprovisioning,
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "Absent",
            Self::Provisioning => "Provisioning",
            Self::Active => "Active",
            Self::Deprovisioning => "Deprovisioning",
        };
        f.write_str(name)
    }
}

/// Validates a domain state transition.
pub fn validate_transition(resource: &str, from: DomainState, to: DomainState) -> Result<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(DependencyOrderError::IllegalTransition {
            resource: resource.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
        .into())
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: DomainState) -> Vec<DomainState> {
    match from {
        DomainState::Absent => vec![DomainState::Provisioning],
        DomainState::Provisioning => vec![DomainState::Active],
        DomainState::Active => vec![DomainState::Deprovisioning],
        DomainState::Deprovisioning => vec![DomainState::Absent],
    }
}

/// Instance and image for an application type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Instance type
    pub instance_type: String,
    /// Image, when not the service default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sage_maker_image_arn: Option<Arn>,
}

impl ResourceSpec {
    /// `system` instance, service image
    #[must_use]
    pub fn jupyter_default() -> Self {
        Self {
            instance_type: DEFAULT_JUPYTER_INSTANCE.to_string(),
            sage_maker_image_arn: None,
        }
    }

    /// `ml.t3.medium` with the regional data-science image
    pub fn kernel_gateway_default(ctx: &ArnContext) -> Result<Self> {
        let image = Arn::parse(format!(
            "arn:{}:sagemaker:{}:{DATA_SCIENCE_IMAGE_ACCOUNT}:image/datascience-1.0",
            ctx.partition(),
            ctx.region()
        ))?;
        Ok(Self {
            instance_type: DEFAULT_KERNEL_GATEWAY_INSTANCE.to_string(),
            sage_maker_image_arn: Some(image),
        })
    }
}

/// Notebook sharing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingSettings {
    /// Whether notebook output may be shared
    pub notebook_output_allowed: bool,
    /// Destination for shared output
    pub s3_output_path: Option<String>,
    /// Key protecting shared output
    pub s3_kms_key: Option<Arn>,
}

/// Default user settings
///
/// Every field is optional; `None` means the documented default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSettings {
    /// Defaults to [`ResourceSpec::jupyter_default`]
    pub jupyter_server: Option<ResourceSpec>,
    /// Defaults to [`ResourceSpec::kernel_gateway_default`]
    pub kernel_gateway: Option<ResourceSpec>,
    /// Unset by default
    pub sharing: Option<SharingSettings>,
}

impl DomainSettings {
    /// Jupyter server spec in effect
    #[must_use]
    pub fn effective_jupyter_server(&self) -> ResourceSpec {
        self.jupyter_server
            .clone()
            .unwrap_or_else(ResourceSpec::jupyter_default)
    }

    /// Kernel gateway spec in effect
    pub fn effective_kernel_gateway(&self, ctx: &ArnContext) -> Result<ResourceSpec> {
        match &self.kernel_gateway {
            Some(spec) => Ok(spec.clone()),
            None => ResourceSpec::kernel_gateway_default(ctx),
        }
    }
}

/// Requested domain
#[derive(Debug, Clone)]
pub struct DomainSpec {
    /// `<prefix>-<account>`
    pub name: String,
    /// Default user settings
    pub settings: DomainSettings,
    /// Tags
    pub tags: Vec<Tag>,
    /// Removal policy
    pub removal: RemovalPolicy,
}

impl DomainSpec {
    /// Spec named `<prefix>-<account>` with default settings and the project tag
    #[must_use]
    pub fn new(ctx: &ArnContext, prefix: &str, project: &str) -> Self {
        Self {
            name: format!("{prefix}-{}", ctx.account()),
            settings: DomainSettings::default(),
            tags: vec![Tag::project(project)],
            removal: RemovalPolicy::Destroy,
        }
    }

    /// Override the settings
    #[inline]
    #[must_use]
    pub fn with_settings(mut self, settings: DomainSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// What a domain needs before it can activate
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainPrerequisites<'a> {
    /// Private network
    pub perimeter: Option<&'a NetworkPerimeter>,
    /// Workload security group
    pub security_group: Option<&'a WorkloadSecurityGroup>,
    /// Execution role
    pub execution_role: Option<&'a Role>,
    /// Execution role policy
    pub execution_policy: Option<&'a ManagedPolicy>,
    /// Domain key, already granted to the execution role
    pub domain_key: Option<&'a EncryptionKey>,
}

/// Settings applied to every user in the domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultUserSettings {
    /// Execution role ARN
    pub execution_role: Arn,
    /// Security groups
    pub security_groups: Vec<String>,
    /// Jupyter server spec
    pub jupyter_server_app_settings: ResourceSpec,
    /// Kernel gateway spec
    pub kernel_gateway_app_settings: ResourceSpec,
    /// Sharing, when configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharing_settings: Option<SharingSettings>,
}

/// Network binding filled in on activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainBinding {
    /// Private network id
    pub vpc_id: String,
    /// All workload subnets
    pub subnet_ids: Vec<String>,
    /// Domain key id
    pub kms_key_id: String,
    /// Per-user defaults
    pub default_user_settings: DefaultUserSettings,
}

/// The notebook domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDomain {
    domain_name: String,
    domain_id: String,
    arn: Arn,
    auth_mode: &'static str,
    app_network_access_type: &'static str,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    binding: Option<DomainBinding>,
    tags: Vec<Tag>,
    removal_policy: RemovalPolicy,
    #[serde(skip)]
    settings: DomainSettings,
    #[serde(skip)]
    ctx: ArnContext,
    #[serde(skip)]
    state: DomainState,
    #[serde(skip)]
    profile: Option<String>,
}

impl WorkspaceDomain {
    /// Declare a domain; it enters `Provisioning`
    pub fn provision(ctx: &ArnContext, ids: &dyn IdentifierSource, spec: DomainSpec) -> Result<Self> {
        let name_ok = !spec.name.is_empty()
            && spec.name.len() <= 63
            && spec.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !spec.name.starts_with('-')
            && !spec.name.ends_with('-');
        if !name_ok {
            return Err(ConstructionError::invalid(
                "domain_name",
                format!("'{}' is not a valid domain name", spec.name),
            ));
        }
        validate_transition(&spec.name, DomainState::Absent, DomainState::Provisioning)?;
        // Fail now rather than on activation if the image ARN cannot be built
        spec.settings.effective_kernel_gateway(ctx)?;

        let domain_id = ids.allocate(IdentifierKind::Domain, &spec.name);
        let arn = ctx.arn("sagemaker", &format!("domain/{domain_id}"));
        info!(domain = %spec.name, %domain_id, "domain provisioning");
        Ok(Self {
            domain_name: spec.name,
            domain_id,
            arn,
            auth_mode: "IAM",
            app_network_access_type: "VpcOnly",
            binding: None,
            tags: spec.tags,
            removal_policy: spec.removal,
            settings: spec.settings,
            ctx: ctx.clone(),
            state: DomainState::Provisioning,
            profile: None,
        })
    }

    /// Confirm prerequisites and enter `Active`
    pub fn activate(&mut self, prerequisites: &DomainPrerequisites<'_>) -> Result<()> {
        validate_transition(&self.domain_name, self.state, DomainState::Active)?;
        let missing = |what: &str| -> ConstructionError {
            DependencyOrderError::PrerequisiteMissing {
                resource: self.domain_name.clone(),
                missing: what.to_string(),
            }
            .into()
        };

        let perimeter = prerequisites.perimeter.ok_or_else(|| missing("network perimeter"))?;
        let group = prerequisites
            .security_group
            .ok_or_else(|| missing("workload security group"))?;
        let role = prerequisites
            .execution_role
            .ok_or_else(|| missing("execution role"))?;
        let policy = prerequisites
            .execution_policy
            .ok_or_else(|| missing("execution policy"))?;
        let key = prerequisites.domain_key.ok_or_else(|| missing("domain key"))?;

        if !perimeter.trusts(group.id()) {
            return Err(ConfigurationError::UntrustedSecurityGroup {
                group: group.id().to_string(),
                perimeter: perimeter.vpc_id().to_string(),
            }
            .into());
        }
        if !policy.roles().iter().any(|r| r == role.name()) {
            return Err(missing("execution policy attachment"));
        }
        if key.purpose() != KeyPurpose::WorkspaceData {
            return Err(ConstructionError::invalid(
                "domain_key",
                format!("key '{}' is a {} key", key.logical_id(), key.purpose()),
            ));
        }
        if !key.grants_to(&Principal::arn(role.arn().clone())) {
            return Err(missing("domain key grant for the execution role"));
        }
        let subnet_ids = perimeter.workload_subnet_ids();
        if subnet_ids.is_empty() {
            return Err(missing("workload subnet"));
        }

        self.binding = Some(DomainBinding {
            vpc_id: perimeter.vpc_id().to_string(),
            subnet_ids,
            kms_key_id: key.key_id().to_string(),
            default_user_settings: DefaultUserSettings {
                execution_role: role.arn().clone(),
                security_groups: vec![group.id().to_string()],
                jupyter_server_app_settings: self.settings.effective_jupyter_server(),
                kernel_gateway_app_settings: self.settings.effective_kernel_gateway(&self.ctx)?,
                sharing_settings: self.settings.sharing.clone(),
            },
        });
        self.state = DomainState::Active;
        info!(domain = %self.domain_name, vpc = perimeter.vpc_id(), "domain active");
        Ok(())
    }

    /// Enter `Deprovisioning`; the user profile must be gone
    pub fn begin_teardown(&mut self) -> Result<()> {
        if let Some(profile) = &self.profile {
            return Err(DependencyOrderError::ChildrenRemaining {
                parent: self.domain_name.clone(),
                children: vec![profile.clone()],
            }
            .into());
        }
        validate_transition(&self.domain_name, self.state, DomainState::Deprovisioning)?;
        self.state = DomainState::Deprovisioning;
        debug!(domain = %self.domain_name, "domain deprovisioning");
        Ok(())
    }

    /// Enter `Absent`
    pub fn finish_teardown(&mut self) -> Result<()> {
        validate_transition(&self.domain_name, self.state, DomainState::Absent)?;
        self.state = DomainState::Absent;
        self.binding = None;
        info!(domain = %self.domain_name, "domain removed");
        Ok(())
    }

    /// Domain name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.domain_name
    }

    /// Allocated domain id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.domain_id
    }

    /// Domain ARN
    #[inline]
    #[must_use]
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> DomainState {
        self.state
    }

    /// Network binding, present once active
    #[inline]
    #[must_use]
    pub fn binding(&self) -> Option<&DomainBinding> {
        self.binding.as_ref()
    }

    /// Name of the live user profile
    #[inline]
    #[must_use]
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }
}

/// The domain's single user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    user_profile_name: String,
    domain_id: String,
    arn: Arn,
    execution_role: Arn,
    #[serde(skip)]
    app: Option<String>,
}

impl UserProfile {
    /// Create the profile under an active domain
    pub fn create(domain: &mut WorkspaceDomain, name: &str, execution_role: &Role) -> Result<Self> {
        if domain.state != DomainState::Active {
            return Err(DependencyOrderError::ParentNotActive {
                child: name.to_string(),
                parent: domain.domain_name.clone(),
                state: domain.state.to_string(),
            }
            .into());
        }
        if domain.profile.is_some() {
            return Err(ConfigurationError::CardinalityExceeded {
                what: "user profile",
                parent: domain.domain_name.clone(),
            }
            .into());
        }
        if name.is_empty() || name.len() > 63 {
            return Err(ConstructionError::invalid(
                "user_profile_name",
                format!("'{name}' must be 1 to 63 characters"),
            ));
        }

        let arn = domain
            .ctx
            .arn("sagemaker", &format!("user-profile/{}/{name}", domain.domain_id));
        domain.profile = Some(name.to_string());
        debug!(domain = %domain.domain_name, profile = name, "user profile created");
        Ok(Self {
            user_profile_name: name.to_string(),
            domain_id: domain.domain_id.clone(),
            arn,
            execution_role: execution_role.arn().clone(),
            app: None,
        })
    }

    /// Release the profile; its application must be gone
    pub fn delete(self, domain: &mut WorkspaceDomain) -> Result<()> {
        if let Some(app) = self.app {
            return Err(DependencyOrderError::ChildrenRemaining {
                parent: self.user_profile_name,
                children: vec![app],
            }
            .into());
        }
        if domain.profile.as_deref() != Some(self.user_profile_name.as_str()) {
            return Err(ConstructionError::invalid(
                "user_profile",
                format!(
                    "'{}' does not belong to domain '{}'",
                    self.user_profile_name, domain.domain_name
                ),
            ));
        }
        domain.profile = None;
        debug!(domain = %domain.domain_name, profile = %self.user_profile_name, "user profile deleted");
        Ok(())
    }

    /// Profile name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.user_profile_name
    }

    /// Profile ARN
    #[inline]
    #[must_use]
    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// Owning domain id
    #[inline]
    #[must_use]
    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    /// Name of the live application
    #[inline]
    #[must_use]
    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }
}

/// Application type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AppType {
    /// Jupyter server
    JupyterServer,
}

/// The profile's default application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    app_name: String,
    app_type: AppType,
    domain_id: String,
    user_profile_name: String,
    resource_spec: ResourceSpec,
}

impl Application {
    /// Create the `default` Jupyter server app
    pub fn create(profile: &mut UserProfile, resource_spec: ResourceSpec) -> Result<Self> {
        if profile.app.is_some() {
            return Err(ConfigurationError::CardinalityExceeded {
                what: "application",
                parent: profile.user_profile_name.clone(),
            }
            .into());
        }
        profile.app = Some(DEFAULT_APP_NAME.to_string());
        debug!(profile = %profile.user_profile_name, app = DEFAULT_APP_NAME, "application created");
        Ok(Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            app_type: AppType::JupyterServer,
            domain_id: profile.domain_id.clone(),
            user_profile_name: profile.user_profile_name.clone(),
            resource_spec,
        })
    }

    /// Release the app
    pub fn delete(self, profile: &mut UserProfile) -> Result<()> {
        if profile.user_profile_name != self.user_profile_name || profile.app.is_none() {
            return Err(ConstructionError::invalid(
                "application",
                format!("'{}' does not belong to '{}'", self.app_name, profile.user_profile_name),
            ));
        }
        profile.app = None;
        Ok(())
    }

    /// App name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.app_name
    }

    /// App type
    #[inline]
    #[must_use]
    pub fn app_type(&self) -> AppType {
        self.app_type
    }

    /// Instance spec
    #[inline]
    #[must_use]
    pub fn resource_spec(&self) -> &ResourceSpec {
        &self.resource_spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyRegistry;
    use enclave_core::{AccountId, DerivedIdentifiers, ErrorKind};
    use enclave_iam::{Conditions, PolicyComposer, StatementBuilder};
    use enclave_network::{
        apply_workspace_rules, create_network, create_security_group, FlowLogSink, NetworkConfig,
    };

    struct Fixture {
        ctx: ArnContext,
        perimeter: NetworkPerimeter,
        group: WorkloadSecurityGroup,
        role: Role,
        policy: ManagedPolicy,
        key: EncryptionKey,
    }

    fn fixture() -> Fixture {
        let ctx = ArnContext::new(AccountId::new("111111111111").unwrap(), "us-east-1").unwrap();
        let ids = DerivedIdentifiers::new();
        let sink = FlowLogSink::new("/flow", ctx.arn("kms", "key/flow")).unwrap();
        let mut perimeter = create_network(&ids, &ctx, &NetworkConfig::default(), sink).unwrap();
        let mut group = create_security_group(&mut perimeter, &ids, "sg", "workload").unwrap();
        apply_workspace_rules(&mut group).unwrap();

        let composer = PolicyComposer::new(&ctx);
        let mut role = composer
            .compose_role("exec", [Principal::service("sagemaker.amazonaws.com")])
            .unwrap();
        let statement = StatementBuilder::allow("Logs")
            .action_names(&["logs:PutLogEvents"])
            .resource(ctx.log_group_arn("/aws/sagemaker/studio:*"))
            .build()
            .unwrap();
        let policy = composer
            .attach_policy(&mut role, "exec-policy", "test", vec![statement])
            .unwrap();

        let registry = KeyRegistry::new(&ctx, &ids);
        let mut key = registry
            .create_key("domain", "domain", KeyPurpose::WorkspaceData, "domain")
            .unwrap();
        registry
            .grant(&mut key, Principal::arn(role.arn().clone()), &["kms:Decrypt"], Conditions::new())
            .unwrap();
        Fixture {
            ctx,
            perimeter,
            group,
            role,
            policy,
            key,
        }
    }

    impl Fixture {
        fn prerequisites(&self) -> DomainPrerequisites<'_> {
            DomainPrerequisites {
                perimeter: Some(&self.perimeter),
                security_group: Some(&self.group),
                execution_role: Some(&self.role),
                execution_policy: Some(&self.policy),
                domain_key: Some(&self.key),
            }
        }

        fn active_domain(&self) -> WorkspaceDomain {
            let spec = DomainSpec::new(&self.ctx, DOMAIN_PREFIX, PROJECT_TAG);
            let mut domain = WorkspaceDomain::provision(&self.ctx, &DerivedIdentifiers::new(), spec).unwrap();
            domain.activate(&self.prerequisites()).unwrap();
            domain
        }
    }

    #[test]
    fn transitions_follow_the_cycle() {
        use DomainState as S;
        assert!(validate_transition("d", S::Absent, S::Provisioning).is_ok());
        assert!(validate_transition("d", S::Deprovisioning, S::Absent).is_ok());
        let err = validate_transition("d", S::Absent, S::Active).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyOrder);
        assert!(allowed_transitions(S::Active).contains(&S::Deprovisioning));
        assert!(!allowed_transitions(S::Provisioning).contains(&S::Deprovisioning));
        assert_eq!(allowed_transitions(S::Deprovisioning), vec![S::Absent]);
    }

    #[test]
    fn activation_binds_network_and_key() {
        let f = fixture();
        let domain = f.active_domain();
        assert_eq!(domain.name(), "security-lake-gen-ai-111111111111");
        assert_eq!(domain.state(), DomainState::Active);
        let binding = domain.binding().unwrap();
        assert_eq!(binding.subnet_ids, f.perimeter.workload_subnet_ids());
        assert_eq!(binding.kms_key_id, f.key.key_id());
        assert_eq!(binding.default_user_settings.security_groups, [f.group.id().to_string()]);
        assert_eq!(
            binding
                .default_user_settings
                .kernel_gateway_app_settings
                .sage_maker_image_arn
                .as_ref()
                .unwrap()
                .as_str(),
            "arn:aws:sagemaker:us-east-1:081325390199:image/datascience-1.0"
        );

        let json = serde_json::to_value(&domain).unwrap();
        assert_eq!(json["authMode"], "IAM");
        assert_eq!(json["appNetworkAccessType"], "VpcOnly");
        assert_eq!(json["defaultUserSettings"]["jupyterServerAppSettings"]["instanceType"], "system");
    }

    #[test]
    fn activation_requires_every_prerequisite() {
        let f = fixture();
        let spec = DomainSpec::new(&f.ctx, DOMAIN_PREFIX, PROJECT_TAG);
        let mut domain = WorkspaceDomain::provision(&f.ctx, &DerivedIdentifiers::new(), spec).unwrap();

        let without_key = DomainPrerequisites {
            domain_key: None,
            ..f.prerequisites()
        };
        let err = domain.activate(&without_key).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::DependencyOrder(DependencyOrderError::PrerequisiteMissing { .. })
        ));
        assert_eq!(domain.state(), DomainState::Provisioning);

        let err = domain.activate(&DomainPrerequisites::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyOrder);
    }

    #[test]
    fn activation_requires_key_grant_to_role() {
        let f = fixture();
        let ids = DerivedIdentifiers::new();
        let ungranted = KeyRegistry::new(&f.ctx, &ids)
            .create_key("bare", "bare", KeyPurpose::WorkspaceData, "no grants")
            .unwrap();
        let spec = DomainSpec::new(&f.ctx, DOMAIN_PREFIX, PROJECT_TAG);
        let mut domain = WorkspaceDomain::provision(&f.ctx, &ids, spec).unwrap();
        let prerequisites = DomainPrerequisites {
            domain_key: Some(&ungranted),
            ..f.prerequisites()
        };
        assert!(domain.activate(&prerequisites).is_err());
    }

    #[test]
    fn profile_requires_active_domain() {
        let f = fixture();
        let spec = DomainSpec::new(&f.ctx, DOMAIN_PREFIX, PROJECT_TAG);
        let mut domain = WorkspaceDomain::provision(&f.ctx, &DerivedIdentifiers::new(), spec).unwrap();
        let err = UserProfile::create(&mut domain, "exec", &f.role).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::DependencyOrder(DependencyOrderError::ParentNotActive { .. })
        ));
    }

    #[test]
    fn exactly_one_profile_and_app() {
        let f = fixture();
        let mut domain = f.active_domain();
        let mut profile = UserProfile::create(&mut domain, "exec", &f.role).unwrap();
        assert_eq!(
            profile.arn().as_str(),
            format!("arn:aws:sagemaker:us-east-1:111111111111:user-profile/{}/exec", domain.id())
        );
        let err = UserProfile::create(&mut domain, "second", &f.role).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let app = Application::create(&mut profile, ResourceSpec::jupyter_default()).unwrap();
        assert_eq!(app.name(), "default");
        assert_eq!(app.app_type(), AppType::JupyterServer);
        assert!(Application::create(&mut profile, ResourceSpec::jupyter_default()).is_err());
    }

    #[test]
    fn teardown_releases_children_first() {
        let f = fixture();
        let mut domain = f.active_domain();
        let mut profile = UserProfile::create(&mut domain, "exec", &f.role).unwrap();
        let app = Application::create(&mut profile, ResourceSpec::jupyter_default()).unwrap();

        let err = domain.begin_teardown().unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::DependencyOrder(DependencyOrderError::ChildrenRemaining { .. })
        ));
        let err = profile.clone().delete(&mut domain).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyOrder);

        app.delete(&mut profile).unwrap();
        profile.delete(&mut domain).unwrap();
        domain.begin_teardown().unwrap();
        domain.finish_teardown().unwrap();
        assert_eq!(domain.state(), DomainState::Absent);
        assert!(domain.binding().is_none());
    }
}

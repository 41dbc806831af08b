pub mod account;
pub mod department;
pub mod faq;
pub mod organization;
pub mod page;
pub mod refs;
pub mod sla;
pub mod staff;
pub mod system;
pub mod task;
pub mod team;
pub mod thread;
pub mod ticket;
pub mod topic;
pub mod user;

pub use account::{ApiKey, StaffAccount, UserAccount};
pub use department::{Department, DepartmentDetail, DepartmentMember};
pub use faq::{Faq, FaqCategory, FaqCategoryRef, FaqDetail, FaqQuery};
pub use organization::{manager_staff_id, Organization, OrganizationDetail, OrganizationManager};
pub use page::{PageRequest, Paged, Pagination};
pub use refs::{
    DepartmentRef, OrganizationRef, PriorityRef, SlaRef, StaffRef, StatusRef, TeamRef, TopicRef, Visibility,
};
pub use sla::{SlaDetail, SlaPlan, SlaUsage};
pub use staff::{RoleRef, StaffDepartment, StaffDetail, StaffQuery, StaffSummary, StaffTeam};
pub use system::{Priority, SystemConfig, SystemStats, TicketStats, TicketStatus};
pub use task::{TaskDetail, TaskQuery, TaskSummary, TaskTicket};
pub use team::{Team, TeamDetail, TeamMember};
pub use thread::{ThreadEntry, ThreadEntryType, ThreadEvent};
pub use ticket::{
    Collaborator, IntakeTopic, NewTicket, ThreadInfo, TicketDetail, TicketQuery, TicketRef, TicketSort, TicketSummary,
    TicketUser,
};
pub use topic::{DefaultAssignee, Topic, TopicForm};
pub use user::{UserDetail, UserEmail, UserQuery, UserSummary};

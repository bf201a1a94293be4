/// Every operation the commander can queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    ListRegisters,
    RegisterInfo,
    SearchRegisters,
    ReadUint16,
    ReadUint32,
    ReadString32,
    WriteUint16,
    WriteUint32,
    ResetApplicationParamsPowerAndCb,
    GlobalChannelErrorResetAllCb,
    ErrorCounterResetAllCb,
    ResetApplicationParamsQuint,
    ProductNamePowerModule,
    ProductNameModule,
    ProductNameQuint,
    NumConnectedModules,
    GetNominalCurrent,
    SetNominalCurrent,
    UnlockNominalCurrent,
    PrintDeviceInfo,
    GetSystemStatus,
    GetChannelStatus,
    GetLoadCurrent,
    ControlChannel,
    ReadCoil,
    WriteCoil,
}

impl ActionKind {
    /// Flags without arguments, in the order they are queued.
    pub const FLAGS: [ActionKind; 10] = [
        Self::ListRegisters,
        Self::ResetApplicationParamsPowerAndCb,
        Self::GlobalChannelErrorResetAllCb,
        Self::ErrorCounterResetAllCb,
        Self::ResetApplicationParamsQuint,
        Self::ProductNamePowerModule,
        Self::ProductNameQuint,
        Self::NumConnectedModules,
        Self::PrintDeviceInfo,
        Self::GetSystemStatus,
    ];

    /// Flags with arguments, in the order they are queued after
    /// [Self::FLAGS].
    pub const WITH_ARGUMENTS: [ActionKind; 16] = [
        Self::RegisterInfo,
        Self::SearchRegisters,
        Self::ReadUint16,
        Self::ReadUint32,
        Self::ReadString32,
        Self::WriteUint16,
        Self::WriteUint32,
        Self::ProductNameModule,
        Self::GetNominalCurrent,
        Self::SetNominalCurrent,
        Self::UnlockNominalCurrent,
        Self::GetChannelStatus,
        Self::GetLoadCurrent,
        Self::ControlChannel,
        Self::ReadCoil,
        Self::WriteCoil,
    ];

    /// Name used in the options dump.
    pub fn name(&self) -> &'static str {
        use ActionKind::*;
        match self {
            ListRegisters => "LIST_REGISTERS",
            RegisterInfo => "REGISTER_INFO",
            SearchRegisters => "SEARCH_REGISTERS",
            ReadUint16 => "READ_UINT16",
            ReadUint32 => "READ_UINT32",
            ReadString32 => "READ_STRING32",
            WriteUint16 => "WRITE_UINT16",
            WriteUint32 => "WRITE_UINT32",
            ResetApplicationParamsPowerAndCb => "RESET_APPLICATION_PARAMS_POWER_AND_CB",
            GlobalChannelErrorResetAllCb => "GLOBAL_CHANNEL_ERROR_RESET_ALL_CB",
            ErrorCounterResetAllCb => "ERROR_COUNTER_RESET_ALL_CB",
            ResetApplicationParamsQuint => "RESET_APPLICATION_PARAMS_QUINT",
            ProductNamePowerModule => "GET_PRODUCT_NAME_POWER_MODULE",
            ProductNameModule => "GET_PRODUCT_NAME_MODULE",
            ProductNameQuint => "GET_PRODUCT_NAME_QUINT",
            NumConnectedModules => "GET_NUM_CONNECTED_MODULES",
            GetNominalCurrent => "GET_NOMINAL_CURRENT",
            SetNominalCurrent => "SET_NOMINAL_CURRENT",
            UnlockNominalCurrent => "UNLOCK_NOMINAL_CURRENT",
            PrintDeviceInfo => "PRINT_DEVICE_INFO",
            GetSystemStatus => "GET_SYSTEM_STATUS",
            GetChannelStatus => "GET_CHANNEL_STATUS",
            GetLoadCurrent => "GET_LOAD_CURRENT",
            ControlChannel => "CONTROL_CHANNEL",
            ReadCoil => "READ_COIL",
            WriteCoil => "WRITE_COIL",
        }
    }

    /// Section title used in reports.
    pub fn title(&self) -> &'static str {
        use ActionKind::*;
        match self {
            ListRegisters => "All Registers",
            RegisterInfo => "Register Information",
            SearchRegisters => "Search Results",
            ReadUint16 => "Read UINT16 Register",
            ReadUint32 => "Read UINT32 Register",
            ReadString32 => "Read STRING32 Register",
            WriteUint16 => "Write UINT16 Registers",
            WriteUint32 => "Write UINT32 Registers",
            ResetApplicationParamsPowerAndCb => {
                "Reset Application Parameters (Power Module and Circuit Breakers)"
            }
            GlobalChannelErrorResetAllCb => "Global Channel Error Reset (All Circuit Breakers)",
            ErrorCounterResetAllCb => "Error Counter Reset (All Circuit Breakers)",
            ResetApplicationParamsQuint => "Reset Application Parameters (QUINT Power Supply)",
            ProductNamePowerModule => "Product Name (Power Module)",
            ProductNameModule => "Product Name",
            ProductNameQuint => "Product Name (QUINT Power Supply)",
            NumConnectedModules => "Number of Currently Connected Modules",
            GetNominalCurrent => "Get Nominal Current",
            SetNominalCurrent => "Set Nominal Current",
            UnlockNominalCurrent => "Unlock Nominal Current",
            PrintDeviceInfo => "Device Information",
            GetSystemStatus => "System Status",
            GetChannelStatus => "Channel Status",
            GetLoadCurrent => "Load Current",
            ControlChannel => "Control Channel",
            ReadCoil => "Read Coil",
            WriteCoil => "Write Coil",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_kind_is_registered_once() {
        let mut all: Vec<_> = ActionKind::FLAGS
            .iter()
            .chain(ActionKind::WITH_ARGUMENTS.iter())
            .copied()
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 26);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = ActionKind::FLAGS
            .iter()
            .chain(ActionKind::WITH_ARGUMENTS.iter())
            .map(|k| k.name())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 26);
    }
}
